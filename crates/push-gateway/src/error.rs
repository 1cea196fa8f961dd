//! Push gateway errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rejected by provider: {status} {code} - {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

impl GatewayError {
    /// Whether the provider itself turned the request down, as opposed to
    /// the request never completing or its answer being unreadable.
    pub fn is_provider_rejection(&self) -> bool {
        matches!(self, GatewayError::Rejected { .. } | GatewayError::Auth(_))
    }
}
