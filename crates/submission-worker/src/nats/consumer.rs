use crate::dispatcher::{DeliveryDispatcher, Disposition};
use crate::nats::traits::{DeliverySource, DeliveryStream};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, AckKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pull-based consumer that fans deliveries out to the dispatcher.
///
/// Each delivery is handled on its own task so store I/O and retry backoff
/// for one key never stall the intake loop or unrelated deliveries. Exactly
/// one of ack / nak / term is issued per delivery. On shutdown the loop
/// stops fetching and in-flight deliveries finish their current attempt.
pub struct EventConsumer {
    source: Box<dyn DeliverySource>,
    stream_name: String,
    consumer_name: String,
    batch_size: usize,
    max_wait: Duration,
    dispatcher: Arc<DeliveryDispatcher>,
    inflight: JoinSet<()>,
}

impl EventConsumer {
    pub async fn new(
        stream: Arc<dyn DeliveryStream>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        dispatcher: Arc<DeliveryDispatcher>,
    ) -> Result<Self> {
        debug!(
            stream = %stream_name,
            consumer = %consumer_name,
            filter_subject = %subject_filter,
            "creating event consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let source = stream
            .create_consumer(config, stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Self {
            source,
            stream_name: stream_name.to_string(),
            consumer_name: consumer_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            dispatcher,
            inflight: JoinSet::new(),
        })
    }

    /// Run the intake loop until cancellation, then drain in-flight tasks.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "starting event consumer"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(
                        stream = %self.stream_name,
                        consumer = %self.consumer_name,
                        "received shutdown signal, stopping intake"
                    );
                    break;
                }
                result = self.fetch_and_dispatch() => {
                    if let Err(e) = result {
                        error!(
                            stream = %self.stream_name,
                            error = %e,
                            "error fetching deliveries"
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        // Let in-flight deliveries reach their ack/nak decision.
        while let Some(joined) = self.inflight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "delivery task panicked");
            }
        }

        info!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "consumer stopped"
        );
        Ok(())
    }

    async fn fetch_and_dispatch(&mut self) -> Result<()> {
        let deliveries = self.source.fetch(self.batch_size, self.max_wait).await?;
        if deliveries.is_empty() {
            return Ok(());
        }

        debug!(count = deliveries.len(), "received deliveries");

        for delivery in deliveries {
            let dispatcher = self.dispatcher.clone();
            self.inflight
                .spawn(async move { handle_delivery(dispatcher, delivery).await });
        }

        // Reap tasks that already finished so the set does not grow over a
        // long-running consumer's lifetime.
        while self.inflight.try_join_next().is_some() {}

        Ok(())
    }
}

async fn handle_delivery(dispatcher: Arc<DeliveryDispatcher>, delivery: jetstream::Message) {
    let subject = delivery.subject.to_string();

    match dispatcher.process(&delivery.payload).await {
        Disposition::Ack => {
            if let Err(e) = delivery.ack().await {
                error!(subject = %subject, error = %e, "failed to acknowledge delivery");
            }
        }
        Disposition::Requeue => {
            warn!(subject = %subject, "requeueing delivery for redelivery");
            if let Err(e) = delivery.ack_with(AckKind::Nak(None)).await {
                error!(subject = %subject, error = %e, "failed to nak delivery");
            }
        }
        Disposition::Reject => {
            warn!(subject = %subject, "rejecting delivery permanently");
            if let Err(e) = delivery.ack_with(AckKind::Term).await {
                error!(subject = %subject, error = %e, "failed to terminate delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::traits::{MockDeliverySource, MockDeliveryStream};
    use crate::outcome::LogOutcomeObserver;
    use submission_domain::{MockDocumentStore, RetryPolicy, TransactionAggregator};

    fn test_dispatcher() -> Arc<DeliveryDispatcher> {
        let aggregator = Arc::new(TransactionAggregator::new(
            Arc::new(MockDocumentStore::new()),
            RetryPolicy::new(1, Duration::from_millis(1)),
        ));
        Arc::new(DeliveryDispatcher::new(aggregator, Arc::new(LogOutcomeObserver)))
    }

    #[tokio::test]
    async fn creates_durable_consumer() {
        let mut stream = MockDeliveryStream::new();
        stream
            .expect_create_consumer()
            .withf(|config, stream_name| {
                config.durable_name.as_deref() == Some("event-submission")
                    && config.filter_subject == "transaction-events.default"
                    && stream_name == "transaction-events"
            })
            .times(1)
            .returning(|_, _| Ok(Box::new(MockDeliverySource::new())));

        let consumer = EventConsumer::new(
            Arc::new(stream),
            "transaction-events",
            "event-submission",
            "transaction-events.default",
            10,
            5,
            test_dispatcher(),
        )
        .await;

        assert!(consumer.is_ok());
    }

    #[tokio::test]
    async fn consumer_creation_failure_surfaces() {
        let mut stream = MockDeliveryStream::new();
        stream
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("stream not found")));

        let result = EventConsumer::new(
            Arc::new(stream),
            "transaction-events",
            "event-submission",
            "transaction-events.default",
            10,
            5,
            test_dispatcher(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_batch_is_not_an_error() {
        let mut stream = MockDeliveryStream::new();
        stream.expect_create_consumer().returning(|_, _| {
            let mut source = MockDeliverySource::new();
            source.expect_fetch().times(1).returning(|_, _| Ok(vec![]));
            Ok(Box::new(source))
        });

        let mut consumer = EventConsumer::new(
            Arc::new(stream),
            "transaction-events",
            "event-submission",
            "transaction-events.default",
            10,
            5,
            test_dispatcher(),
        )
        .await
        .unwrap();

        assert!(consumer.fetch_and_dispatch().await.is_ok());
    }

    #[tokio::test]
    async fn cancelled_consumer_stops_cleanly() {
        let mut stream = MockDeliveryStream::new();
        stream.expect_create_consumer().returning(|_, _| {
            let mut source = MockDeliverySource::new();
            source.expect_fetch().returning(|_, _| Ok(vec![]));
            Ok(Box::new(source))
        });

        let consumer = EventConsumer::new(
            Arc::new(stream),
            "transaction-events",
            "event-submission",
            "transaction-events.default",
            10,
            5,
            test_dispatcher(),
        )
        .await
        .unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();
        assert!(consumer.run(ctx).await.is_ok());
    }

    // Dispositions for real deliveries cannot be unit tested here because
    // jetstream::Message cannot be constructed without a broker connection;
    // that path is covered by the dispatcher tests plus the end-to-end
    // integration tests.
}
