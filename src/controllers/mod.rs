pub mod bookings;
pub mod catalog;
pub mod seats;

use axum::Router;
use std::sync::Arc;

use crate::store::RecordStore;
use crate::AppState;

pub fn routes<S: RecordStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .merge(bookings::routes())
        .merge(catalog::routes())
        .merge(seats::routes())
}
