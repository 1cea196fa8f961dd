//! HTTP API: token registration and region notification.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::dispatch::Dispatcher;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use token_store::TokenStore;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Token registrations
    pub store: Arc<dyn TokenStore>,
    /// Region fan-out over the configured push provider
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(store: Arc<dyn TokenStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/regions", get(handlers::list_regions))
        .route("/register", post(handlers::register))
        .route("/notify", post(handlers::notify))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
