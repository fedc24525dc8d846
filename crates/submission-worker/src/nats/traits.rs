use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;

/// Broker-side factory for durable pull subscriptions.
///
/// Abstracted so the consumer loop can be exercised against mocks without a
/// running broker.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeliveryStream: Send + Sync {
    /// Create a durable pull consumer on `stream_name`.
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn DeliverySource>>;
}

/// A source of deliveries from one durable subscription.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeliverySource: Send + Sync {
    /// Fetch up to `max_messages` deliveries, waiting at most `expires`.
    async fn fetch(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>>;
}
