//! HTTP request handlers.

use super::types::{
    HealthResponse, NotifyRequest, NotifyResponse, RegionsResponse, RegisterRequest,
    StatusResponse,
};
use super::AppState;
use crate::error::ApiError;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use token_store::{token_fingerprint, Region};
use tracing::info;

fn parse_region(raw: &str) -> Result<Region, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidRegion(raw.to_string()))
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.store.health_check().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        provider: state.dispatcher.provider().to_string(),
        store_healthy,
    })
}

/// List the regions devices can subscribe to.
pub async fn list_regions() -> Json<RegionsResponse> {
    Json(RegionsResponse {
        regions: Region::ALL.to_vec(),
    })
}

/// Register a device token for a region.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::MalformedRequest(e.body_text()))?;

    let region = parse_region(&request.region)?;
    if request.token.trim().is_empty() {
        return Err(ApiError::MalformedRequest("token must not be empty".into()));
    }

    let id = state.store.register(region, &request.token).await?;
    info!(
        %region,
        registration_id = %id,
        token = %token_fingerprint(&request.token),
        "Token registered"
    );

    Ok(Json(StatusResponse::ok()))
}

/// Send the notification to every device registered in a region.
pub async fn notify(
    State(state): State<AppState>,
    request: NotifyRequest,
) -> Result<Json<NotifyResponse>, ApiError> {
    let region = parse_region(&request.region)?;
    info!(%region, "Notify request received");

    let tally = state.dispatcher.dispatch(region).await?;

    Ok(Json(NotifyResponse {
        status: "ok".to_string(),
        tally,
    }))
}
