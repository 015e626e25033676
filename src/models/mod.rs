pub mod venue;
pub mod movie;
pub mod showtime;
pub mod seat;
pub mod booking;

pub use venue::{NewVenue, Venue};
pub use movie::{Movie, NewMovie};
pub use showtime::{NewShowtime, Showtime, ShowtimeDetails, ShowtimeFilter};
pub use seat::{NewSeat, Seat, SeatAvailability, SeatType};
pub use booking::{
    BookedSeat, Booking, BookingDetails, BookingSeat, BookingStatus, BookingWithSeats,
    CreateBookingRequest, NewBooking,
};

/// Text column held a value outside the enum it maps to.
#[derive(Debug, thiserror::Error)]
#[error("unknown {field} value `{value}`")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}
