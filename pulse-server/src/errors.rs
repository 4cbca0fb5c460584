//! API error types and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Control-surface error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Recorder already running")]
    AlreadyRunning,

    #[error("Recorder not running")]
    NotRunning,

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type for handler functions
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::AlreadyRunning => (StatusCode::CONFLICT, "conflict"),
            ApiError::NotRunning => (StatusCode::BAD_REQUEST, "not_running"),
            ApiError::InvalidEvent(_) => (StatusCode::BAD_REQUEST, "invalid_event"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        ApiError::Internal(message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.code();
        let body = json!({
            "error": code,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
