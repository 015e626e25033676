use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;

/// Every failure a handler can report. Each variant maps to one HTTP status
/// and one `kind` in the error body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{message}")]
    Conflict { message: String, seat_ids: Vec<i64> },
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl AppError {
    pub fn seats_taken(seat_ids: impl IntoIterator<Item = i64>) -> Self {
        AppError::Conflict {
            message: "seats already booked".to_string(),
            seat_ids: seat_ids.into_iter().collect(),
        }
    }

    /// Conflict with record state rather than with specific seats.
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            seat_ids: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Persistence,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_ids: Option<Vec<i64>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let (message, seat_ids) = match self {
            AppError::Persistence(err) => {
                tracing::error!(error = %err, "persistence failure");
                ("internal storage error, please retry".to_string(), None)
            }
            AppError::Conflict { message, seat_ids } => {
                (message, Some(seat_ids).filter(|ids| !ids.is_empty()))
            }
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                kind,
                message,
                seat_ids,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn conflict_lists_contested_seats() {
        let (status, body) = body_of(AppError::seats_taken([2, 7])).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.kind, ErrorKind::Conflict);
        assert_eq!(body.error.message, "seats already booked");
        assert_eq!(body.error.seat_ids, Some(vec![2, 7]));
    }

    #[tokio::test]
    async fn record_conflict_has_no_seat_list() {
        let response = AppError::conflict("venue still has bookings").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["kind"], "conflict");
        assert!(body["error"].get("seat_ids").is_none());
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let (status, body) = body_of(AppError::NotFound("showtime")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.message, "showtime not found");
        assert!(body.error.seat_ids.is_none());
    }

    #[tokio::test]
    async fn persistence_hides_store_details() {
        let err = AppError::Persistence(StoreError::ForeignKeyViolation {
            constraint: "booking_seats_seat_id_fkey".into(),
        });
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.kind, ErrorKind::Persistence);
        assert!(!body.error.message.contains("booking_seats"));
    }
}
