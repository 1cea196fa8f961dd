//! Notification payload and delivery outcome.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The fixed payload sent to every recipient of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Sent as the data marker `{"type": <category>}` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Notification sound; only Expo honours it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            category: None,
            sound: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Data map attached to the message, if any.
    pub fn data(&self) -> Option<HashMap<String, String>> {
        self.category
            .as_ref()
            .map(|category| HashMap::from([("type".to_string(), category.clone())]))
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new(
            "⚠️ It's time to BeReal! ⚠️",
            "You have two minutes to post a ReBeal!",
        )
    }
}

/// Outcome of one delivery attempt to one token.
///
/// Backends convert every failure into one of the two failure variants;
/// nothing else escapes a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The provider accepted the message.
    Delivered { receipt: Option<String> },
    /// The provider refused the message (bad token, quota, gateway error).
    ProviderRejected(String),
    /// The attempt failed for any other reason (I/O, timeout, decoding).
    UnexpectedError(String),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered { .. })
    }

    /// Diagnostic detail of a failed delivery.
    pub fn failure_detail(&self) -> Option<&str> {
        match self {
            DeliveryResult::Delivered { .. } => None,
            DeliveryResult::ProviderRejected(detail) | DeliveryResult::UnexpectedError(detail) => {
                Some(detail.as_str())
            }
        }
    }
}

impl From<Result<Option<String>, GatewayError>> for DeliveryResult {
    fn from(result: Result<Option<String>, GatewayError>) -> Self {
        match result {
            Ok(receipt) => DeliveryResult::Delivered { receipt },
            Err(e) if e.is_provider_rejection() => DeliveryResult::ProviderRejected(e.to_string()),
            Err(e) => DeliveryResult::UnexpectedError(e.to_string()),
        }
    }
}
