//! Regional push notification service.
//!
//! Devices register a push token for one region; a notify request for a
//! region sends a fixed reminder to every token registered there and
//! reports how many deliveries succeeded and failed.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod error;

pub use config::Config;
pub use dispatch::{DispatchTally, Dispatcher};
pub use error::ApiError;
