//! API request and response types.

use crate::dispatch::DispatchTally;
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use token_store::Region;

/// Request to register a device token for a region.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Region name, validated by the handler
    pub region: String,

    /// Provider token; clients may also send it as `fcmToken` or `expoToken`
    #[serde(alias = "fcmToken", alias = "expoToken")]
    pub token: String,
}

/// Request to notify every device in a region.
///
/// Accepted as a URL-encoded form or as a JSON body.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub region: String,
}

#[async_trait]
impl<S> FromRequest<S> for NotifyRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(request) = Json::<NotifyRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedRequest(e.body_text()))?;
            Ok(request)
        } else {
            let Form(request) = Form::<NotifyRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedRequest(e.body_text()))?;
            Ok(request)
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Result of a notify request.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: String,
    #[serde(flatten)]
    pub tally: DispatchTally,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub store_healthy: bool,
}

/// Supported regions.
#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    pub regions: Vec<Region>,
}
