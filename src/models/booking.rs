use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use super::{Seat, ShowtimeDetails, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a booking in this status still holds its seats.
    pub fn holds_seats(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownVariant::new("status", other)),
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub showtime_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub total_price: i64,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub booking_code: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Link row: `seat_id` is claimed by `booking_id`. `showtime_id` is copied
/// from the booking so seat lookups per showtime stay on one table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct BookingSeat {
    pub id: i64,
    pub booking_id: i64,
    pub seat_id: i64,
    pub showtime_id: i64,
}

/// Booking seat as presented to clients, with the seat itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedSeat {
    pub id: i64,
    pub booking_id: i64,
    pub seat_id: i64,
    pub seat: Seat,
}

/// Row to insert when a booking is created.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub showtime_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub total_price: i64,
    pub status: BookingStatus,
    pub booking_code: String,
}

/// Booking with its showtime, movie and venue. `showtime` is absent only when
/// the post-commit reload failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub showtime: Option<ShowtimeDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingWithSeats {
    pub booking: BookingDetails,
    pub seats: Vec<BookedSeat>,
}

// POST /api/bookings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "showtime_id must be positive"))]
    pub showtime_id: i64,
    #[validate(custom(function = "not_blank", message = "customer_name is required"))]
    pub customer_name: String,
    #[validate(email(message = "customer_email must be a valid email"))]
    pub customer_email: String,
    #[validate(custom(function = "not_blank", message = "customer_phone is required"))]
    pub customer_phone: String,
    #[validate(
        length(min = 1, message = "at least one seat must be selected"),
        custom(function = "distinct_seat_ids")
    )]
    pub seat_ids: Vec<i64>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn distinct_seat_ids(seat_ids: &[i64]) -> Result<(), ValidationError> {
    if seat_ids.iter().any(|id| *id <= 0) {
        let mut err = ValidationError::new("seat_id");
        err.message = Some("seat ids must be positive".into());
        return Err(err);
    }
    let mut seen = HashSet::with_capacity(seat_ids.len());
    if !seat_ids.iter().all(|id| seen.insert(*id)) {
        let mut err = ValidationError::new("duplicate_seat");
        err.message = Some("seat ids must not repeat".into());
        return Err(err);
    }
    Ok(())
}
