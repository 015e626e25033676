use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{Movie, Venue};

/// A screening of a movie at a venue. `price` is per seat, in the smallest
/// currency unit.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub venue_id: i64,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub price: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Showtime together with the movie and venue it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowtimeDetails {
    #[serde(flatten)]
    pub showtime: Showtime,
    pub movie: Movie,
    pub venue: Venue,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShowtime {
    #[validate(range(min = 1, message = "movie_id must be positive"))]
    pub movie_id: i64,
    #[validate(range(min = 1, message = "venue_id must be positive"))]
    pub venue_id: i64,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ShowtimeFilter {
    pub movie_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

impl ShowtimeFilter {
    pub fn matches(&self, showtime: &Showtime) -> bool {
        self.movie_id.map_or(true, |id| showtime.movie_id == id)
            && self.venue_id.map_or(true, |id| showtime.venue_id == id)
            && self.date.map_or(true, |date| showtime.show_date == date)
    }
}
