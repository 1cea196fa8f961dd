//! Push delivery backends behind a single [`PushGateway`] contract.
//!
//! Each backend turns provider-specific failures into a [`DeliveryResult`],
//! so callers treat every recipient's failure the same way regardless of
//! which provider is configured.

mod error;
mod expo;
mod fcm;
mod gateway;
mod types;

pub use error::GatewayError;
pub use expo::{ExpoClient, DEFAULT_EXPO_ENDPOINT};
pub use fcm::{FcmClient, ServiceAccountKey, DEFAULT_FCM_ENDPOINT};
pub use gateway::{LoggingGateway, PushGateway};
pub use types::*;
