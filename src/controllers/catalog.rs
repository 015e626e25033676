use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::cache::{MOVIES_KEY, VENUES_KEY};
use crate::error::AppError;
use crate::middleware::{ApiPath, ApiQuery, ValidatedJson};
use crate::models::{NewMovie, NewShowtime, NewVenue, ShowtimeFilter};
use crate::store::{RecordStore, StoreError};
use crate::AppState;

pub fn routes<S: RecordStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/venues", get(list_venues::<S>).post(create_venue::<S>))
        .route(
            "/venues/{id}",
            get(get_venue::<S>)
                .put(update_venue::<S>)
                .delete(delete_venue::<S>),
        )
        .route("/movies", get(list_movies::<S>).post(create_movie::<S>))
        .route(
            "/movies/{id}",
            get(get_movie::<S>)
                .put(update_movie::<S>)
                .delete(delete_movie::<S>),
        )
        .route("/showtimes", get(list_showtimes::<S>).post(create_showtime::<S>))
        .route("/showtimes/{id}", get(get_showtime::<S>))
}

/* ---------- VENUES ---------- */

async fn list_venues<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, AppError> {
    let (venues, cache) = state.cache.venues(&state.store).await?;
    Ok(([("X-Cache", cache.as_header())], Json(venues)))
}

async fn get_venue<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let venue = state
        .store
        .find_venue(id)
        .await?
        .ok_or(AppError::NotFound("venue"))?;
    Ok(Json(venue))
}

async fn create_venue<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<NewVenue>,
) -> Result<impl IntoResponse, AppError> {
    let venue = state.store.create_venue(&req).await?;
    state.cache.invalidate(VENUES_KEY).await;
    info!(venue_id = venue.id, "venue created");
    Ok((StatusCode::CREATED, Json(venue)))
}

async fn update_venue<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(req): ValidatedJson<NewVenue>,
) -> Result<impl IntoResponse, AppError> {
    let venue = state
        .store
        .update_venue(id, &req)
        .await?
        .ok_or(AppError::NotFound("venue"))?;
    state.cache.invalidate(VENUES_KEY).await;
    info!(venue_id = id, "venue updated");
    Ok(Json(venue))
}

async fn delete_venue<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .store
        .delete_venue(id)
        .await
        .map_err(|err| still_booked(err, "venue"))?;
    if !deleted {
        return Err(AppError::NotFound("venue"));
    }
    state.cache.invalidate(VENUES_KEY).await;
    info!(venue_id = id, "venue deleted");
    Ok(Json(Deleted {
        message: "Venue deleted successfully".to_string(),
    }))
}

/* ---------- MOVIES ---------- */

async fn list_movies<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, AppError> {
    let (movies, cache) = state.cache.movies(&state.store).await?;
    Ok(([("X-Cache", cache.as_header())], Json(movies)))
}

async fn get_movie<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state
        .store
        .find_movie(id)
        .await?
        .ok_or(AppError::NotFound("movie"))?;
    Ok(Json(movie))
}

async fn create_movie<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<NewMovie>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state.store.create_movie(&req).await?;
    state.cache.invalidate(MOVIES_KEY).await;
    info!(movie_id = movie.id, "movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(req): ValidatedJson<NewMovie>,
) -> Result<impl IntoResponse, AppError> {
    let movie = state
        .store
        .update_movie(id, &req)
        .await?
        .ok_or(AppError::NotFound("movie"))?;
    state.cache.invalidate(MOVIES_KEY).await;
    info!(movie_id = id, "movie updated");
    Ok(Json(movie))
}

async fn delete_movie<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .store
        .delete_movie(id)
        .await
        .map_err(|err| still_booked(err, "movie"))?;
    if !deleted {
        return Err(AppError::NotFound("movie"));
    }
    state.cache.invalidate(MOVIES_KEY).await;
    info!(movie_id = id, "movie deleted");
    Ok(Json(Deleted {
        message: "Movie deleted successfully".to_string(),
    }))
}

#[derive(Debug, Serialize)]
struct Deleted {
    message: String,
}

// Брони никогда не удаляются, поэтому запись с бронями удалить нельзя
fn still_booked(err: StoreError, what: &str) -> AppError {
    match err {
        StoreError::ForeignKeyViolation { .. } => {
            AppError::conflict(format!("{what} has bookings and cannot be deleted"))
        }
        other => AppError::Persistence(other),
    }
}

/* ---------- SHOWTIMES ---------- */

#[derive(Debug, Default, Deserialize)]
pub struct ShowtimesQuery {
    pub movie_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub date: Option<String>,
}

impl ShowtimesQuery {
    fn into_filter(self) -> Result<ShowtimeFilter, AppError> {
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation(format!("date `{raw}` must be formatted as YYYY-MM-DD"))
            })?),
        };
        Ok(ShowtimeFilter {
            movie_id: self.movie_id,
            venue_id: self.venue_id,
            date,
        })
    }
}

async fn list_showtimes<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(params): ApiQuery<ShowtimesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.into_filter()?;
    Ok(Json(state.store.list_showtimes(&filter).await?))
}

async fn get_showtime<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let showtime = state
        .store
        .find_showtime(id)
        .await?
        .ok_or(AppError::NotFound("showtime"))?;
    Ok(Json(showtime))
}

async fn create_showtime<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ValidatedJson(req): ValidatedJson<NewShowtime>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.find_movie(req.movie_id).await?.is_none() {
        return Err(AppError::NotFound("movie"));
    }
    if state.store.find_venue(req.venue_id).await?.is_none() {
        return Err(AppError::NotFound("venue"));
    }
    let showtime = state.store.create_showtime(&req).await?;
    info!(showtime_id = showtime.id, movie_id = showtime.movie_id, "showtime created");
    let details = state
        .store
        .find_showtime(showtime.id)
        .await?
        .ok_or(AppError::NotFound("showtime"))?;
    Ok((StatusCode::CREATED, Json(details)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_filter() {
        let filter = ShowtimesQuery {
            movie_id: Some(3),
            venue_id: None,
            date: Some("2025-03-14".into()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.movie_id, Some(3));
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2025, 3, 14));
    }

    #[test]
    fn blank_date_means_no_filter() {
        let filter = ShowtimesQuery {
            date: Some(" ".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert!(filter.date.is_none());
    }

    #[test]
    fn referenced_record_delete_is_a_conflict() {
        let err = still_booked(
            StoreError::ForeignKeyViolation {
                constraint: "bookings_showtime_id_fkey".into(),
            },
            "venue",
        );
        assert!(matches!(err, AppError::Conflict { ref seat_ids, .. } if seat_ids.is_empty()));
        assert!(matches!(
            still_booked(StoreError::SerializationFailure, "venue"),
            AppError::Persistence(_)
        ));
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        let err = ShowtimesQuery {
            date: Some("14/03/2025".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
