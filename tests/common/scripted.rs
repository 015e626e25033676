//! `MemoryStore` wrapper whose transactions misbehave on cue, for driving the
//! booking service down paths a single-process store never takes on its own.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cinema_booking::config::IsolationLevel;
use cinema_booking::models::{
    BookedSeat, Booking, BookingDetails, Movie, NewBooking, NewMovie, NewSeat, NewShowtime,
    NewVenue, Seat, SeatAvailability, Showtime, ShowtimeDetails, ShowtimeFilter, Venue,
};
use cinema_booking::store::memory::MemoryTx;
use cinema_booking::store::{MemoryStore, RecordStore, StoreError, StoreResult, StoreTx};

/// What the next transactions should do. One-shot flags are cleared when
/// they fire.
#[derive(Debug, Default)]
pub struct Script {
    /// `insert_booking` reports a code collision this many more times.
    pub code_collisions: u32,
    /// Calls that reached `insert_booking`, collisions included.
    pub insert_attempts: u32,
    /// Next conflict check sees no holds, as a stale snapshot would.
    pub stale_snapshot: bool,
    pub serialize_on_insert: bool,
    pub serialize_on_seat: bool,
    /// `commit` fails with a serialization failure this many more times.
    pub commit_failures: u32,
}

#[derive(Clone)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            script: Arc::default(),
        }
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().unwrap());
    }

    pub fn insert_attempts(&self) -> u32 {
        self.script.lock().unwrap().insert_attempts
    }
}

pub struct ScriptedTx {
    inner: MemoryTx,
    script: Arc<Mutex<Script>>,
}

impl ScriptedTx {
    fn take(&self, flag: impl FnOnce(&mut Script) -> &mut bool) -> bool {
        std::mem::take(flag(&mut self.script.lock().unwrap()))
    }
}

#[async_trait]
impl StoreTx for ScriptedTx {
    async fn showtime_for_booking(&mut self, showtime_id: i64) -> StoreResult<Option<Showtime>> {
        self.inner.showtime_for_booking(showtime_id).await
    }

    async fn held_seat_ids(&mut self, showtime_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<i64>> {
        if self.take(|s| &mut s.stale_snapshot) {
            return Ok(Vec::new());
        }
        self.inner.held_seat_ids(showtime_id, seat_ids).await
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Option<Booking>> {
        {
            let mut script = self.script.lock().unwrap();
            script.insert_attempts += 1;
            if script.code_collisions > 0 {
                script.code_collisions -= 1;
                return Ok(None);
            }
        }
        if self.take(|s| &mut s.serialize_on_insert) {
            return Err(StoreError::SerializationFailure);
        }
        self.inner.insert_booking(booking).await
    }

    async fn insert_booking_seat(&mut self, booking: &Booking, seat_id: i64) -> StoreResult<()> {
        if self.take(|s| &mut s.serialize_on_seat) {
            return Err(StoreError::SerializationFailure);
        }
        self.inner.insert_booking_seat(booking, seat_id).await
    }

    async fn commit(self) -> StoreResult<()> {
        let fail = {
            let mut script = self.script.lock().unwrap();
            let fail = script.commit_failures > 0;
            script.commit_failures = script.commit_failures.saturating_sub(1);
            fail
        };
        if fail {
            return self.inner.rollback().await.and(Err(StoreError::SerializationFailure));
        }
        self.inner.commit().await
    }

    async fn rollback(self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    type Tx = ScriptedTx;

    async fn begin(&self, isolation: IsolationLevel) -> StoreResult<ScriptedTx> {
        Ok(ScriptedTx {
            inner: self.inner.begin(isolation).await?,
            script: self.script.clone(),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn create_venue(&self, venue: &NewVenue) -> StoreResult<Venue> {
        self.inner.create_venue(venue).await
    }

    async fn list_venues(&self) -> StoreResult<Vec<Venue>> {
        self.inner.list_venues().await
    }

    async fn find_venue(&self, id: i64) -> StoreResult<Option<Venue>> {
        self.inner.find_venue(id).await
    }

    async fn update_venue(&self, id: i64, venue: &NewVenue) -> StoreResult<Option<Venue>> {
        self.inner.update_venue(id, venue).await
    }

    async fn delete_venue(&self, id: i64) -> StoreResult<bool> {
        self.inner.delete_venue(id).await
    }

    async fn create_movie(&self, movie: &NewMovie) -> StoreResult<Movie> {
        self.inner.create_movie(movie).await
    }

    async fn list_movies(&self) -> StoreResult<Vec<Movie>> {
        self.inner.list_movies().await
    }

    async fn find_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        self.inner.find_movie(id).await
    }

    async fn update_movie(&self, id: i64, movie: &NewMovie) -> StoreResult<Option<Movie>> {
        self.inner.update_movie(id, movie).await
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<bool> {
        self.inner.delete_movie(id).await
    }

    async fn create_showtime(&self, showtime: &NewShowtime) -> StoreResult<Showtime> {
        self.inner.create_showtime(showtime).await
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<ShowtimeDetails>> {
        self.inner.list_showtimes(filter).await
    }

    async fn find_showtime(&self, id: i64) -> StoreResult<Option<ShowtimeDetails>> {
        self.inner.find_showtime(id).await
    }

    async fn create_seats(&self, seats: &[NewSeat]) -> StoreResult<Vec<Seat>> {
        self.inner.create_seats(seats).await
    }

    async fn list_seats(&self, venue_id: Option<i64>) -> StoreResult<Vec<Seat>> {
        self.inner.list_seats(venue_id).await
    }

    async fn find_booking(&self, booking_code: &str) -> StoreResult<Option<BookingDetails>> {
        self.inner.find_booking(booking_code).await
    }

    async fn booked_seats(&self, booking_id: i64) -> StoreResult<Vec<BookedSeat>> {
        self.inner.booked_seats(booking_id).await
    }

    async fn list_bookings(&self) -> StoreResult<Vec<BookingDetails>> {
        self.inner.list_bookings().await
    }

    async fn seat_map(&self, showtime_id: i64) -> StoreResult<Option<Vec<SeatAvailability>>> {
        self.inner.seat_map(showtime_id).await
    }

    async fn cancel_booking(&self, booking_code: &str) -> StoreResult<Option<Booking>> {
        self.inner.cancel_booking(booking_code).await
    }
}
