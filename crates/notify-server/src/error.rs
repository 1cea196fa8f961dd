//! Error types for the notification service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use token_store::{Region, StoreError};

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid region '{0}'")]
    InvalidRegion(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Token already registered")]
    DuplicateToken,

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Region>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidRegion(_) => (StatusCode::BAD_REQUEST, "INVALID_REGION"),
            ApiError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "MALFORMED_REQUEST"),
            ApiError::DuplicateToken => (StatusCode::CONFLICT, "DUPLICATE_TOKEN"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        };

        let allowed = matches!(self, ApiError::InvalidRegion(_)).then(|| Region::ALL.to_vec());

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            allowed,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateToken(_) => ApiError::DuplicateToken,
            other => ApiError::Storage(other.to_string()),
        }
    }
}
