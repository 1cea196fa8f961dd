//! Delivery contract and the logging backend.

use crate::error::GatewayError;
use crate::types::{DeliveryResult, Notification};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// A push provider able to deliver one notification to one token.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Backend name (e.g. "fcm").
    fn provider(&self) -> &'static str;

    /// Attempt a single delivery. Never fails: errors come back as
    /// [`DeliveryResult::ProviderRejected`] or [`DeliveryResult::UnexpectedError`].
    async fn send(&self, token: &str, notification: &Notification) -> DeliveryResult;
}

/// Backend that only logs what it would send. Every send is delivered.
#[derive(Debug, Clone, Default)]
pub struct LoggingGateway;

impl LoggingGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushGateway for LoggingGateway {
    fn provider(&self) -> &'static str {
        "log"
    }

    async fn send(&self, token: &str, notification: &Notification) -> DeliveryResult {
        info!(
            target: "push",
            token_len = token.len(),
            title = %notification.title,
            body = %notification.body,
            "push notification (not sent)"
        );
        DeliveryResult::Delivered { receipt: None }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, GatewayError> {
    Ok(Client::builder().timeout(timeout).build()?)
}
