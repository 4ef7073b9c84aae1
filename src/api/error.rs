//! API error type and JSON error bodies.
//!
//! Every failure is rendered as `{"error": "..."}` with a matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ChronosError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist or is disabled.
    NotFound(String),
    /// 500 Internal Server Error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<ChronosError> for ApiError {
    fn from(err: ChronosError) -> Self {
        match &err {
            ChronosError::InvalidMessage(msg) => ApiError::BadRequest(msg.clone()),
            _ => {
                tracing::error!("Request failed: {}", err);
                ApiError::Internal(err.user_message())
            }
        }
    }
}
