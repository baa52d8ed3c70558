//! Error types for wsd-clock

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Configured stream settings do not form a valid playlist URL (500)
    #[error("Invalid stream URL: {0}")]
    InvalidStreamUrl(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidStreamUrl(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_STREAM_URL", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
