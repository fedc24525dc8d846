use crate::dispatcher::DeliveryDispatcher;
use crate::nats::{DeliveryStream, EventConsumer};
use crate::outcome::OutcomeObserver;
use std::sync::Arc;
use submission_domain::{DocumentStore, RetryPolicy, TransactionAggregator};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SubmissionWorkerConfig {
    pub stream: String,
    pub subject: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub batch_wait_secs: u64,
}

/// Wires the aggregation pipeline to a broker subscription.
pub struct SubmissionWorker {
    consumer: EventConsumer,
}

impl SubmissionWorker {
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        observer: Arc<dyn OutcomeObserver>,
        delivery_stream: Arc<dyn DeliveryStream>,
        retry: RetryPolicy,
        config: SubmissionWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing event submission worker");

        let aggregator = Arc::new(TransactionAggregator::new(store, retry));
        let dispatcher = Arc::new(DeliveryDispatcher::new(aggregator, observer));

        let consumer = EventConsumer::new(
            delivery_stream,
            &config.stream,
            &config.consumer_name,
            &config.subject,
            config.batch_size,
            config.batch_wait_secs,
            dispatcher,
        )
        .await?;

        info!("event submission worker initialized");
        Ok(Self { consumer })
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.consumer.run(ctx).await
    }
}
