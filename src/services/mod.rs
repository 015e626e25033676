pub mod booking;
pub mod booking_code;
pub mod conflicts;

pub use booking::BookingService;
