//! Storage contract shared by all backends.

use crate::error::StoreError;
use crate::types::{Region, Registration, RegistrationId};
use async_trait::async_trait;

/// Durable mapping from push tokens to regions.
///
/// Registrations are append-only: there is no update or delete.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a new registration and return its id.
    async fn register(&self, region: Region, token: &str) -> Result<RegistrationId, StoreError>;

    /// All registrations for `region`, in no particular order.
    ///
    /// An empty result is not an error.
    async fn list_by_region(&self, region: Region) -> Result<Vec<Registration>, StoreError>;

    /// Whether the backing storage currently answers.
    async fn health_check(&self) -> bool;

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}
