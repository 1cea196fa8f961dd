//! Construction of the process-lifetime store, gateway and dispatcher.

use crate::api::AppState;
use crate::config::{Config, PushConfig, PushProvider, StoreConfig};
use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use push_gateway::{ExpoClient, FcmClient, LoggingGateway, PushGateway, ServiceAccountKey};
use std::sync::Arc;
use token_store::{MemoryTokenStore, SqlTokenStore, TokenPolicy, TokenStore};
use tracing::{info, warn};

/// Open the configured token store.
pub async fn build_store(config: &StoreConfig) -> Result<Arc<dyn TokenStore>> {
    let policy = TokenPolicy::from_unique_flag(config.unique_tokens);

    match &config.url {
        Some(url) => {
            let store = SqlTokenStore::connect(url, config.max_connections, policy)
                .await
                .context("Failed to connect to token database")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("STORE__URL not set, registrations are kept in memory and lost on restart");
            Ok(Arc::new(MemoryTokenStore::with_policy(policy)))
        }
    }
}

/// Create the configured push backend.
pub fn build_gateway(config: &PushConfig) -> Result<Arc<dyn PushGateway>> {
    let gateway: Arc<dyn PushGateway> = match config.provider {
        PushProvider::Fcm => {
            let credentials = config
                .fcm
                .credentials
                .as_deref()
                .context("PUSH__FCM__CREDENTIALS is required for the fcm provider")?;
            let key = ServiceAccountKey::from_encoded(credentials)
                .context("Failed to parse FCM service account key")?;
            let client = FcmClient::new(key, &config.fcm.endpoint, config.timeout)
                .context("Failed to create FCM client")?;
            info!(project_id = client.project_id(), "Using FCM push provider");
            Arc::new(client)
        }
        PushProvider::Expo => {
            let client = ExpoClient::new(
                &config.expo.endpoint,
                config.expo.access_token.clone(),
                config.timeout,
            )
            .context("Failed to create Expo client")?;
            info!(endpoint = %config.expo.endpoint, "Using Expo push provider");
            Arc::new(client)
        }
        PushProvider::Log => {
            warn!("Push provider is 'log', notifications are only written to the log");
            Arc::new(LoggingGateway::new())
        }
    };

    Ok(gateway)
}

/// Build the shared application state from configuration.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let gateway = build_gateway(&config.push)?;
    let store = build_store(&config.store).await?;

    let dispatcher = Dispatcher::new(
        store.clone(),
        gateway,
        config.notification.to_notification(),
    )
    .with_concurrency(config.dispatch.concurrency);

    Ok(AppState::new(store, dispatcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExpoConfig, FcmConfig};
    use std::time::Duration;
    use token_store::Region;

    const TEST_PRIVATE_KEY: &str = include_str!("../../push-gateway/testdata/test-rsa-key.pem");

    fn push_config(provider: PushProvider) -> PushConfig {
        PushConfig {
            provider,
            timeout: Duration::from_secs(1),
            fcm: FcmConfig::default(),
            expo: ExpoConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_without_url() {
        let store = build_store(&StoreConfig::default()).await.unwrap();

        store.register(Region::AsiaEast, "abc").await.unwrap();
        assert_eq!(store.list_by_region(Region::AsiaEast).await.unwrap().len(), 1);
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_sql_store_with_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            url: Some(format!(
                "sqlite://{}?mode=rwc",
                dir.path().join("tokens.db").display()
            )),
            unique_tokens: true,
            ..StoreConfig::default()
        };

        let store = build_store(&config).await.unwrap();
        store.register(Region::UsCentral, "abc").await.unwrap();
        assert!(store.register(Region::UsCentral, "abc").await.is_err());
        store.close().await;
    }

    #[tokio::test]
    async fn test_unsupported_store_url() {
        let config = StoreConfig {
            url: Some("mysql://localhost/push".into()),
            ..StoreConfig::default()
        };
        assert!(build_store(&config).await.is_err());
    }

    #[test]
    fn test_log_gateway() {
        let gateway = build_gateway(&push_config(PushProvider::Log)).unwrap();
        assert_eq!(gateway.provider(), "log");
    }

    #[test]
    fn test_expo_gateway() {
        let gateway = build_gateway(&push_config(PushProvider::Expo)).unwrap();
        assert_eq!(gateway.provider(), "expo");
    }

    #[test]
    fn test_fcm_requires_credentials() {
        let err = build_gateway(&push_config(PushProvider::Fcm)).err().unwrap();
        assert!(err.to_string().contains("PUSH__FCM__CREDENTIALS"));
    }

    #[test]
    fn test_fcm_gateway_from_credentials() {
        let mut config = push_config(PushProvider::Fcm);
        config.fcm.credentials = Some(
            serde_json::json!({
                "type": "service_account",
                "project_id": "demo-project",
                "private_key": TEST_PRIVATE_KEY,
                "client_email": "push@demo-project.iam.gserviceaccount.com",
            })
            .to_string(),
        );

        let gateway = build_gateway(&config).unwrap();
        assert_eq!(gateway.provider(), "fcm");
    }

    #[tokio::test]
    async fn test_build_state_with_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({})).unwrap();

        let state = build_state(&config).await.unwrap();
        assert_eq!(state.dispatcher.provider(), "log");
        assert_eq!(
            state.dispatcher.notification(),
            &push_gateway::Notification::default()
        );
    }
}
