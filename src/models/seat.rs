use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatType {
    #[default]
    Regular,
    Premium,
    Vip,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Regular => "regular",
            SeatType::Premium => "premium",
            SeatType::Vip => "vip",
        }
    }
}

impl fmt::Display for SeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(SeatType::Regular),
            "premium" => Ok(SeatType::Premium),
            "vip" => Ok(SeatType::Vip),
            other => Err(UnknownVariant::new("seat_type", other)),
        }
    }
}

impl TryFrom<String> for SeatType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Physical seat of a venue. `row`/`column` live in `row_label`/`column_number`
/// because both names are reserved in SQL.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub venue_id: i64,
    pub seat_number: String,
    #[sqlx(rename = "row_label")]
    pub row: String,
    #[sqlx(rename = "column_number")]
    pub column: i32,
    #[sqlx(try_from = "String")]
    pub seat_type: SeatType,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSeat {
    #[validate(range(min = 1, message = "venue_id must be positive"))]
    pub venue_id: i64,
    #[validate(length(min = 1, max = 10, message = "seat_number must be 1-10 characters"))]
    pub seat_number: String,
    #[validate(length(min = 1, max = 5, message = "row must be 1-5 characters"))]
    pub row: String,
    #[validate(range(min = 1, message = "column must be positive"))]
    pub column: i32,
    #[serde(default)]
    pub seat_type: SeatType,
}

/// Seat of a showtime's venue, annotated with whether a non-cancelled booking
/// holds it.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SeatAvailability {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub seat: Seat,
    pub is_available: bool,
}
