use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{ApiJson, ApiPath};
use crate::models::{Booking, CreateBookingRequest};
use crate::services::booking_code::looks_like_booking_code;
use crate::store::RecordStore;
use crate::AppState;

pub fn routes<S: RecordStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/bookings", post(create_booking::<S>).get(list_bookings::<S>))
        .route("/bookings/{booking_code}", get(get_booking::<S>))
        .route("/bookings/{booking_code}/cancel", put(cancel_booking::<S>))
}

// POST /api/bookings
async fn create_booking<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.bookings.create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
async fn list_bookings<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.bookings.list_bookings().await?))
}

// GET /api/bookings/{booking_code}
async fn get_booking<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(booking_code): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let code = normalize_code(&booking_code)?;
    Ok(Json(state.bookings.get_booking(&code).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub message: String,
    pub booking: Booking,
}

// PUT /api/bookings/{booking_code}/cancel
async fn cancel_booking<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiPath(booking_code): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let code = normalize_code(&booking_code)?;
    let booking = state.bookings.cancel_booking(&code).await?;
    Ok(Json(CancelResponse {
        message: "Booking cancelled successfully".to_string(),
        booking,
    }))
}

// Коды выдаются в верхнем регистре, клиенты часто присылают как попало
fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_ascii_uppercase();
    if !looks_like_booking_code(&code) {
        return Err(AppError::NotFound("booking"));
    }
    Ok(code)
}
