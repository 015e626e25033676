use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::{ApiJson, ApiPath, ApiQuery};
use crate::models::NewSeat;
use crate::store::{RecordStore, StoreError};
use crate::AppState;

pub fn routes<S: RecordStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/showtimes/{id}/seats", get(showtime_seats::<S>))
        .route("/seats", get(list_seats::<S>).post(create_seats::<S>))
}

// GET /api/showtimes/{id}/seats
async fn showtime_seats<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(showtime_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.bookings.seat_map(showtime_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SeatsQuery {
    pub venue_id: Option<i64>,
}

// GET /api/seats
async fn list_seats<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(params): ApiQuery<SeatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_seats(params.venue_id).await?))
}

// POST /api/seats, тело - массив мест
async fn create_seats<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(seats): ApiJson<Vec<NewSeat>>,
) -> Result<impl IntoResponse, AppError> {
    if seats.is_empty() {
        return Err(AppError::Validation("at least one seat is required".to_string()));
    }
    for seat in &seats {
        seat.validate()?;
    }

    let venue_ids: BTreeSet<i64> = seats.iter().map(|seat| seat.venue_id).collect();
    for venue_id in venue_ids {
        if state.store.find_venue(venue_id).await?.is_none() {
            return Err(AppError::NotFound("venue"));
        }
    }

    let created = state.store.create_seats(&seats).await.map_err(|err| match err {
        StoreError::UniqueViolation { .. } => {
            AppError::conflict("seat_number already exists in this venue")
        }
        other => AppError::Persistence(other),
    })?;
    tracing::info!(count = created.len(), "seats created");
    Ok((StatusCode::CREATED, Json(created)))
}
