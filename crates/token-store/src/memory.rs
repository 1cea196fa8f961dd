//! In-memory token store.

use crate::error::StoreError;
use crate::store::TokenStore;
use crate::types::{Region, Registration, RegistrationId, TokenPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

struct Inner {
    registrations: Vec<Registration>,
    next_id: i64,
}

/// Token store kept in process memory. Contents are lost on restart.
#[derive(Clone)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<Inner>>,
    policy: TokenPolicy,
}

impl MemoryTokenStore {
    /// Create an empty store that accepts duplicate tokens.
    pub fn new() -> Self {
        Self::with_policy(TokenPolicy::AllowDuplicates)
    }

    pub fn with_policy(policy: TokenPolicy) -> Self {
        info!(?policy, "In-memory token store initialized");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                registrations: Vec::new(),
                next_id: 1,
            })),
            policy,
        }
    }

    /// Total number of registrations across all regions.
    pub async fn count(&self) -> usize {
        self.inner.read().await.registrations.len()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    #[instrument(skip(self, token), fields(region = %region))]
    async fn register(&self, region: Region, token: &str) -> Result<RegistrationId, StoreError> {
        let mut inner = self.inner.write().await;

        if self.policy == TokenPolicy::Unique
            && inner.registrations.iter().any(|r| r.token == token)
        {
            return Err(StoreError::DuplicateToken(crate::token_fingerprint(token)));
        }

        let id = RegistrationId(inner.next_id);
        inner.next_id += 1;
        inner.registrations.push(Registration {
            id,
            token: token.to_string(),
            region,
        });

        debug!(registration_id = %id, "Stored registration");
        Ok(id)
    }

    #[instrument(skip(self), fields(region = %region))]
    async fn list_by_region(&self, region: Region) -> Result<Vec<Registration>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .registrations
            .iter()
            .filter(|r| r.region == region)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
