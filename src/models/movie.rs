use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Running time in minutes.
    pub duration: i32,
    pub genre: Option<String>,
    /// Age rating: PG, PG-13, R ...
    pub rating: Option<String>,
    pub poster_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMovie {
    #[validate(length(min = 1, max = 255, message = "title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "duration must be positive"))]
    pub duration: i32,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    #[validate(length(max = 10))]
    pub rating: Option<String>,
    #[validate(url(message = "poster_url must be a valid URL"))]
    pub poster_url: Option<String>,
}
