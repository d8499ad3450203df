use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Enrollment limit reached")]
    CapacityExceeded,

    #[error("Quiz already attempted")]
    DuplicateAttempt,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalServerError,
}

// SQLITE_BUSY / SQLITE_LOCKED surface as Conflict so the caller retries
// instead of treating contention on the capacity row as a server fault.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            if code == "5" || code == "6" {
                return AppError::Conflict("database is busy, retry the operation".to_string());
            }
        }
        AppError::Database(e)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg),
            AppError::CapacityExceeded => {
                (StatusCode::CONFLICT, "Enrollment limit reached".to_string())
            }
            AppError::DuplicateAttempt => {
                (StatusCode::CONFLICT, "Quiz already attempted".to_string())
            }
            AppError::Conflict(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
