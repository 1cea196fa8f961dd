//! Configuration for the notification service.

use anyhow::{Context, Result};
use push_gateway::{Notification, DEFAULT_EXPO_ENDPOINT, DEFAULT_FCM_ENDPOINT};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Push provider configuration
    #[serde(default)]
    pub push: PushConfig,

    /// Fixed notification payload
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Fan-out configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    /// Database URL (postgres:// or sqlite:). In-memory storage when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Reject a token that is already registered
    #[serde(default)]
    pub unique_tokens: bool,
}

/// Which push backend delivers notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProvider {
    Fcm,
    Expo,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Backend selection
    #[serde(default = "default_provider")]
    pub provider: PushProvider,

    /// Per-request timeout towards the provider
    #[serde(default = "default_push_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub fcm: FcmConfig,

    #[serde(default)]
    pub expo: ExpoConfig,
}

#[derive(Clone, Deserialize)]
pub struct FcmConfig {
    /// Service account key, base64-encoded or raw JSON
    #[serde(default)]
    pub credentials: Option<String>,

    /// FCM API base URL
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
}

#[derive(Clone, Deserialize)]
pub struct ExpoConfig {
    /// Expo push endpoint
    #[serde(default = "default_expo_endpoint")]
    pub endpoint: String,

    /// Access token for projects with enhanced push security
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_body")]
    pub body: String,

    /// Data marker sent as `{"type": <category>}`
    #[serde(default)]
    pub category: Option<String>,

    /// Sound name (Expo only)
    #[serde(default)]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Sends in flight at once during a dispatch (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level, used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

// Secrets stay out of Debug output.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("max_connections", &self.max_connections)
            .field("unique_tokens", &self.unique_tokens)
            .finish()
    }
}

impl fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FcmConfig")
            .field("credentials", &self.credentials.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl fmt::Debug for ExpoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpoConfig")
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ServerConfig {
    /// Address to bind. Fails if `listen_addr` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid SERVER__LISTEN_ADDR '{}'", self.listen_addr))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl NotificationConfig {
    /// Build the payload sent on every dispatch.
    pub fn to_notification(&self) -> Notification {
        let mut notification = Notification::new(&self.title, &self.body);
        if let Some(category) = &self.category {
            notification = notification.with_category(category);
        }
        if let Some(sound) = &self.sound {
            notification = notification.with_sound(sound);
        }
        notification
    }
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            unique_tokens: false,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout: default_push_timeout(),
            fcm: FcmConfig::default(),
            expo: ExpoConfig::default(),
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            endpoint: default_fcm_endpoint(),
        }
    }
}

impl Default for ExpoConfig {
    fn default() -> Self {
        Self {
            endpoint: default_expo_endpoint(),
            access_token: None,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            category: None,
            sound: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    5
}

fn default_provider() -> PushProvider {
    PushProvider::Log
}

fn default_push_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_fcm_endpoint() -> String {
    DEFAULT_FCM_ENDPOINT.into()
}

fn default_expo_endpoint() -> String {
    DEFAULT_EXPO_ENDPOINT.into()
}

fn default_title() -> String {
    Notification::default().title
}

fn default_body() -> String {
    Notification::default().body
}

fn default_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_env_source(config::Environment::default())
    }

    fn from_env_source(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source.separator("__").try_parsing(false))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(vars: &[(&str, &str)]) -> Result<Config> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_env_source(config::Environment::default().source(Some(source)))
    }

    #[test]
    fn test_defaults() {
        let config = load_from(&[]).unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.store.url.is_none());
        assert!(!config.store.unique_tokens);
        assert_eq!(config.push.provider, PushProvider::Log);
        assert_eq!(config.push.timeout, Duration::from_secs(10));
        assert_eq!(config.push.fcm.endpoint, DEFAULT_FCM_ENDPOINT);
        assert_eq!(config.push.expo.endpoint, DEFAULT_EXPO_ENDPOINT);
        assert_eq!(config.dispatch.concurrency, 8);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.notification.to_notification(), Notification::default());
    }

    #[test]
    fn test_nested_overrides() {
        let config = load_from(&[
            ("SERVER__PORT", "9090"),
            ("STORE__URL", "sqlite://tokens.db"),
            ("STORE__UNIQUE_TOKENS", "true"),
            ("PUSH__PROVIDER", "expo"),
            ("PUSH__TIMEOUT", "3s"),
            ("PUSH__EXPO__ACCESS_TOKEN", "secret"),
            ("NOTIFICATION__TITLE", "Heads up"),
            ("NOTIFICATION__CATEGORY", "reminder"),
            ("DISPATCH__CONCURRENCY", "2"),
            ("LOG__FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.url.as_deref(), Some("sqlite://tokens.db"));
        assert!(config.store.unique_tokens);
        assert_eq!(config.push.provider, PushProvider::Expo);
        assert_eq!(config.push.timeout, Duration::from_secs(3));
        assert_eq!(config.push.expo.access_token.as_deref(), Some("secret"));
        assert_eq!(config.dispatch.concurrency, 2);
        assert_eq!(config.log.format, LogFormat::Json);

        let notification = config.notification.to_notification();
        assert_eq!(notification.title, "Heads up");
        assert_eq!(notification.body, Notification::default().body);
        assert_eq!(notification.category.as_deref(), Some("reminder"));
    }

    #[test]
    fn test_socket_addr() {
        let config = load_from(&[("SERVER__LISTEN_ADDR", "127.0.0.1"), ("SERVER__PORT", "9090")])
            .unwrap();
        assert_eq!(
            config.server.socket_addr().unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_listen_addr_is_an_error() {
        let config = load_from(&[("SERVER__LISTEN_ADDR", "localhost:80")]).unwrap();
        let err = config.server.socket_addr().unwrap_err();
        assert!(err.to_string().contains("SERVER__LISTEN_ADDR"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(load_from(&[("PUSH__PROVIDER", "carrier-pigeon")]).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load_from(&[
            ("STORE__URL", "postgres://user:hunter2@db/push"),
            ("PUSH__FCM__CREDENTIALS", "c2VjcmV0"),
            ("PUSH__EXPO__ACCESS_TOKEN", "expo-secret"),
        ])
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(!rendered.contains("expo-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
