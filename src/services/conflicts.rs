use std::collections::BTreeSet;

use crate::store::{StoreResult, StoreTx};

/// Seats among `candidates` already held for the showtime by a non-cancelled
/// booking. Must run on the transaction that will write the new booking.
pub async fn find_conflicts<T: StoreTx>(
    tx: &mut T,
    showtime_id: i64,
    candidates: &[i64],
) -> StoreResult<BTreeSet<i64>> {
    if candidates.is_empty() {
        return Ok(BTreeSet::new());
    }
    let requested: BTreeSet<i64> = candidates.iter().copied().collect();
    let held = tx.held_seat_ids(showtime_id, candidates).await?;
    Ok(held
        .into_iter()
        .filter(|seat_id| requested.contains(seat_id))
        .collect())
}
