//! Region fan-out: one notification to every token registered in a region.

use futures::{stream, FutureExt, StreamExt};
use push_gateway::{DeliveryResult, Notification, PushGateway};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use token_store::{Region, Registration, StoreError, TokenStore};
use tracing::{debug, info, instrument, warn};

/// Default number of sends in flight during one dispatch.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome counts of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchTally {
    pub success: usize,
    pub fail: usize,
}

impl DispatchTally {
    /// Total number of delivery attempts.
    pub fn attempted(&self) -> usize {
        self.success + self.fail
    }

    fn record(&mut self, result: &DeliveryResult) {
        if result.is_delivered() {
            self.success += 1;
        } else {
            self.fail += 1;
        }
    }
}

/// Delivers the configured notification to a region's registrations.
pub struct Dispatcher {
    store: Arc<dyn TokenStore>,
    gateway: Arc<dyn PushGateway>,
    notification: Notification,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TokenStore>,
        gateway: Arc<dyn PushGateway>,
        notification: Notification,
    ) -> Self {
        Self {
            store,
            gateway,
            notification,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of concurrent sends. Values below 1 mean sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn provider(&self) -> &'static str {
        self.gateway.provider()
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Send the notification to every registration in `region`.
    ///
    /// Fails only when the registrations cannot be loaded. Individual
    /// delivery failures are logged and counted in the tally.
    #[instrument(skip(self), fields(region = %region, provider = self.gateway.provider()))]
    pub async fn dispatch(&self, region: Region) -> Result<DispatchTally, StoreError> {
        let registrations = self.store.list_by_region(region).await?;
        if registrations.is_empty() {
            debug!("No registrations in region");
            return Ok(DispatchTally::default());
        }

        debug!(
            recipients = registrations.len(),
            concurrency = self.concurrency,
            "Dispatching"
        );

        let outcomes: Vec<(Registration, DeliveryResult)> = stream::iter(registrations)
            .map(|registration| async move {
                let result = self.deliver(&registration.token).await;
                (registration, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut tally = DispatchTally::default();
        for (registration, result) in &outcomes {
            if let Some(detail) = result.failure_detail() {
                warn!(
                    registration_id = %registration.id,
                    token = %registration.token_fingerprint(),
                    %detail,
                    "Delivery failed"
                );
            }
            tally.record(result);
        }

        info!(success = tally.success, fail = tally.fail, "Dispatch complete");
        Ok(tally)
    }

    async fn deliver(&self, token: &str) -> DeliveryResult {
        let send = async { self.gateway.send(token, &self.notification).await };
        match AssertUnwindSafe(send).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                DeliveryResult::UnexpectedError(format!("send panicked: {}", detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use token_store::{MemoryTokenStore, RegistrationId};

    mock! {
        pub Gateway {}

        #[async_trait]
        impl PushGateway for Gateway {
            fn provider(&self) -> &'static str;
            async fn send(&self, token: &str, notification: &Notification) -> DeliveryResult;
        }
    }

    mock! {
        pub Store {}

        #[async_trait]
        impl TokenStore for Store {
            async fn register(&self, region: Region, token: &str) -> Result<RegistrationId, StoreError>;
            async fn list_by_region(&self, region: Region) -> Result<Vec<Registration>, StoreError>;
            async fn health_check(&self) -> bool;
            async fn close(&self);
        }
    }

    fn mock_gateway() -> MockGateway {
        let mut gateway = MockGateway::new();
        gateway.expect_provider().return_const("mock");
        gateway
    }

    async fn store_with(region: Region, tokens: &[&str]) -> Arc<MemoryTokenStore> {
        let store = MemoryTokenStore::new();
        for token in tokens {
            store.register(region, token).await.unwrap();
        }
        Arc::new(store)
    }

    fn dispatcher(store: Arc<dyn TokenStore>, gateway: impl PushGateway + 'static) -> Dispatcher {
        Dispatcher::new(store, Arc::new(gateway), Notification::default())
    }

    #[tokio::test]
    async fn test_empty_region_never_calls_gateway() {
        let store = store_with(Region::UsCentral, &["a", "b"]).await;
        let mut gateway = mock_gateway();
        gateway.expect_send().never();

        let tally = dispatcher(store, gateway)
            .dispatch(Region::AsiaEast)
            .await
            .unwrap();

        assert_eq!(tally, DispatchTally { success: 0, fail: 0 });
    }

    #[tokio::test]
    async fn test_all_delivered() {
        let store = store_with(Region::EuropeWest, &["a", "b", "c", "d"]).await;
        let mut gateway = mock_gateway();
        gateway
            .expect_send()
            .times(4)
            .returning(|_, _| DeliveryResult::Delivered { receipt: None });

        let tally = dispatcher(store, gateway)
            .dispatch(Region::EuropeWest)
            .await
            .unwrap();

        assert_eq!(tally, DispatchTally { success: 4, fail: 0 });
    }

    #[tokio::test]
    async fn test_all_rejected_still_attempts_everyone() {
        let store = store_with(Region::AsiaWest, &["a", "b", "c"]).await;
        let mut gateway = mock_gateway();
        gateway
            .expect_send()
            .times(3)
            .returning(|_, _| DeliveryResult::ProviderRejected("UNREGISTERED".into()));

        let tally = dispatcher(store, gateway)
            .dispatch(Region::AsiaWest)
            .await
            .unwrap();

        assert_eq!(tally, DispatchTally { success: 0, fail: 3 });
        assert_eq!(tally.attempted(), 3);
    }

    #[tokio::test]
    async fn test_failure_in_the_middle_does_not_stop_the_rest() {
        let store = store_with(Region::UsCentral, &["t1", "t2", "t3"]).await;
        let mut gateway = mock_gateway();
        gateway.expect_send().times(3).returning(|token, _| {
            if token == "t2" {
                DeliveryResult::UnexpectedError("connection reset".into())
            } else {
                DeliveryResult::Delivered { receipt: None }
            }
        });

        let tally = dispatcher(store, gateway)
            .with_concurrency(1)
            .dispatch(Region::UsCentral)
            .await
            .unwrap();

        assert_eq!(tally, DispatchTally { success: 2, fail: 1 });
    }

    #[tokio::test]
    async fn test_duplicate_token_sent_twice() {
        let store = store_with(Region::AsiaEast, &["same", "same"]).await;
        let mut gateway = mock_gateway();
        gateway
            .expect_send()
            .withf(|token, _| token == "same")
            .times(2)
            .returning(|_, _| DeliveryResult::Delivered { receipt: None });

        let tally = dispatcher(store, gateway)
            .dispatch(Region::AsiaEast)
            .await
            .unwrap();

        assert_eq!(tally.success, 2);
    }

    #[tokio::test]
    async fn test_store_failure_fails_dispatch() {
        let mut store = MockStore::new();
        store
            .expect_list_by_region()
            .returning(|_| Err(StoreError::Unavailable("pool closed".into())));
        let mut gateway = mock_gateway();
        gateway.expect_send().never();

        let result = dispatcher(Arc::new(store), gateway)
            .dispatch(Region::UsCentral)
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    struct PanickingGateway;

    #[async_trait]
    impl PushGateway for PanickingGateway {
        fn provider(&self) -> &'static str {
            "panicking"
        }

        async fn send(&self, token: &str, _notification: &Notification) -> DeliveryResult {
            if token == "bad" {
                panic!("backend bug");
            }
            DeliveryResult::Delivered { receipt: None }
        }
    }

    #[tokio::test]
    async fn test_panicking_send_counts_as_failure() {
        let store = store_with(Region::EuropeWest, &["ok-1", "bad", "ok-2"]).await;

        let tally = dispatcher(store, PanickingGateway)
            .dispatch(Region::EuropeWest)
            .await
            .unwrap();

        assert_eq!(tally, DispatchTally { success: 2, fail: 1 });
    }

    #[derive(Default)]
    struct SlowGateway {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PushGateway for SlowGateway {
        fn provider(&self) -> &'static str {
            "slow"
        }

        async fn send(&self, _token: &str, _notification: &Notification) -> DeliveryResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            DeliveryResult::Delivered { receipt: None }
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let tokens: Vec<String> = (0..12).map(|i| format!("token-{i}")).collect();
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let store = store_with(Region::UsCentral, &refs).await;
        let gateway = Arc::new(SlowGateway::default());

        let dispatcher = Dispatcher::new(store, gateway.clone(), Notification::default())
            .with_concurrency(3);
        let tally = dispatcher.dispatch(Region::UsCentral).await.unwrap();

        assert_eq!(tally.success, 12);
        let peak = gateway.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {peak}");
        assert!(peak > 1, "sends never overlapped");
    }

    #[test]
    fn test_zero_concurrency_means_sequential() {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let dispatcher = dispatcher(store, mock_gateway()).with_concurrency(0);
        assert_eq!(dispatcher.concurrency, 1);
    }
}
