//! Record store: the only place booking state lives.
//!
//! `RecordStore` covers single-statement reads and writes; everything the
//! booking orchestrator does between `begin` and `commit` goes through a
//! `StoreTx`, so the conflict check and the seat writes share one unit of work.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::IsolationLevel;
use crate::models::{
    BookedSeat, Booking, BookingDetails, Movie, NewBooking, NewMovie, NewSeat, NewShowtime,
    NewVenue, Seat, SeatAvailability, Showtime, ShowtimeDetails, ShowtimeFilter, Venue,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

// Имена ограничений совпадают со схемой в src/migrations
pub const BOOKING_CODE_KEY: &str = "bookings_booking_code_key";
pub const HELD_SEATS_PKEY: &str = "held_seats_pkey";
pub const BOOKING_SEATS_SEAT_FKEY: &str = "booking_seats_seat_id_fkey";
pub const BOOKINGS_SHOWTIME_FKEY: &str = "bookings_showtime_id_fkey";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },
    #[error("foreign key constraint `{constraint}` violated")]
    ForeignKeyViolation { constraint: String },
    #[error("transaction could not be serialized against a concurrent one")]
    SerializationFailure,
    #[error("store did not finish within {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation { constraint },
                Some("23503") => return StoreError::ForeignKeyViolation { constraint },
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::SerializationFailure,
                _ => {}
            }
        }
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout(Duration::ZERO),
            other => StoreError::Database(other),
        }
    }
}

#[async_trait]
pub trait RecordStore: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Opens a transaction at the given isolation level.
    async fn begin(&self, isolation: IsolationLevel) -> StoreResult<Self::Tx>;

    async fn ping(&self) -> StoreResult<()>;

    async fn create_venue(&self, venue: &NewVenue) -> StoreResult<Venue>;
    async fn list_venues(&self) -> StoreResult<Vec<Venue>>;
    async fn find_venue(&self, id: i64) -> StoreResult<Option<Venue>>;
    /// Replaces the editable fields. `None` when the venue does not exist.
    async fn update_venue(&self, id: i64, venue: &NewVenue) -> StoreResult<Option<Venue>>;
    /// Removes the venue with its showtimes and seats. Fails with a foreign
    /// key violation while any booking refers to them. `false` when absent.
    async fn delete_venue(&self, id: i64) -> StoreResult<bool>;

    async fn create_movie(&self, movie: &NewMovie) -> StoreResult<Movie>;
    async fn list_movies(&self) -> StoreResult<Vec<Movie>>;
    async fn find_movie(&self, id: i64) -> StoreResult<Option<Movie>>;
    async fn update_movie(&self, id: i64, movie: &NewMovie) -> StoreResult<Option<Movie>>;
    /// Same rules as `delete_venue`, for the movie's showtimes.
    async fn delete_movie(&self, id: i64) -> StoreResult<bool>;

    async fn create_showtime(&self, showtime: &NewShowtime) -> StoreResult<Showtime>;
    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<ShowtimeDetails>>;
    async fn find_showtime(&self, id: i64) -> StoreResult<Option<ShowtimeDetails>>;

    /// Inserts all seats or none.
    async fn create_seats(&self, seats: &[NewSeat]) -> StoreResult<Vec<Seat>>;
    async fn list_seats(&self, venue_id: Option<i64>) -> StoreResult<Vec<Seat>>;

    async fn find_booking(&self, booking_code: &str) -> StoreResult<Option<BookingDetails>>;
    async fn booked_seats(&self, booking_id: i64) -> StoreResult<Vec<BookedSeat>>;
    /// Newest first.
    async fn list_bookings(&self) -> StoreResult<Vec<BookingDetails>>;

    /// `None` when the showtime does not exist.
    async fn seat_map(&self, showtime_id: i64) -> StoreResult<Option<Vec<SeatAvailability>>>;

    /// Marks the booking cancelled and releases its seat holds. Cancelling a
    /// cancelled booking changes nothing. `None` when the code is unknown.
    async fn cancel_booking(&self, booking_code: &str) -> StoreResult<Option<Booking>>;
}

/// Unit of work for creating a booking. Dropping it without `commit` discards
/// every write made through it.
#[async_trait]
pub trait StoreTx: Send + Sized {
    /// Loads the showtime and locks it against deletion for the rest of the
    /// transaction.
    async fn showtime_for_booking(&mut self, showtime_id: i64) -> StoreResult<Option<Showtime>>;

    /// Seat ids among `seat_ids` referenced by a non-cancelled booking of the
    /// showtime.
    async fn held_seat_ids(&mut self, showtime_id: i64, seat_ids: &[i64]) -> StoreResult<Vec<i64>>;

    /// Returns `None` when `booking_code` is already taken.
    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Option<Booking>>;

    /// Links the seat to the booking and takes the (showtime, seat) hold.
    async fn insert_booking_seat(&mut self, booking: &Booking, seat_id: i64) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;
    async fn rollback(self) -> StoreResult<()>;
}
