use crate::outcome::{DeliveryOutcome, OutcomeObserver};
use std::sync::Arc;
use std::time::Instant;
use submission_domain::{DomainError, DomainResult, StorageKey, TransactionAggregator, TransactionEvent};
use tracing::{error, info, instrument, warn};

/// What the broker should do with a delivery after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Commit succeeded; positively acknowledge.
    Ack,
    /// Permanent failure; reject without requeue, redelivery cannot help.
    Reject,
    /// Transient failure; negatively acknowledge so the broker redelivers.
    Requeue,
}

/// Classifies each delivery and drives it through the aggregator.
///
/// Decode and timestamp failures are permanent: redelivering a malformed
/// message would loop forever. Store failures that survive the retry policy
/// are transient and requeue.
pub struct DeliveryDispatcher {
    aggregator: Arc<TransactionAggregator>,
    observer: Arc<dyn OutcomeObserver>,
}

impl DeliveryDispatcher {
    pub fn new(aggregator: Arc<TransactionAggregator>, observer: Arc<dyn OutcomeObserver>) -> Self {
        Self {
            aggregator,
            observer,
        }
    }

    /// Process one delivery body and decide its disposition.
    ///
    /// Every path reports exactly one outcome to the observer.
    #[instrument(skip_all, fields(body_size = body.len()))]
    pub async fn process(&self, body: &[u8]) -> Disposition {
        let started = Instant::now();

        let (outcome, disposition) = match self.commit(body).await {
            Ok(()) => (DeliveryOutcome::Ok, Disposition::Ack),
            Err(e @ DomainError::Decode(_)) => {
                error!(error = %e, "rejecting malformed delivery");
                (DeliveryOutcome::JsonError, Disposition::Reject)
            }
            Err(e @ DomainError::InvalidTimestamp { .. }) => {
                error!(error = %e, "rejecting delivery with unusable timestamp");
                (DeliveryOutcome::TimestampError, Disposition::Reject)
            }
            Err(e) => {
                warn!(error = %e, "commit failed, requeueing delivery");
                (DeliveryOutcome::WriteError, Disposition::Requeue)
            }
        };

        self.observer.delivery_processed(outcome, started.elapsed());
        disposition
    }

    async fn commit(&self, body: &[u8]) -> DomainResult<()> {
        let event = TransactionEvent::decode(body)?;
        info!(
            file_id = %event.file_id,
            event_id = event.event_id,
            "received transaction event"
        );

        let key = StorageKey::resolve(&event.timestamp, &event.file_id)?;

        if event.is_analysis_report() {
            let report = event.analysis_report.as_deref().unwrap_or_default();
            self.aggregator.write_report_once(&key, report).await
        } else {
            self.aggregator.append_event(&key, event.into_record()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::MockOutcomeObserver;
    use serde_json::json;
    use std::time::Duration;
    use submission_domain::{MetadataDocument, MockDocumentStore, RetryPolicy, StoreError};

    fn dispatcher_with(
        store: MockDocumentStore,
        expected_outcome: DeliveryOutcome,
        max_attempts: u32,
    ) -> DeliveryDispatcher {
        let aggregator = Arc::new(TransactionAggregator::new(
            Arc::new(store),
            RetryPolicy::new(max_attempts, Duration::from_millis(1)),
        ));

        let mut observer = MockOutcomeObserver::new();
        observer
            .expect_delivery_processed()
            .withf(move |outcome, _| *outcome == expected_outcome)
            .times(1)
            .return_const(());

        DeliveryDispatcher::new(aggregator, Arc::new(observer))
    }

    fn event_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "FileId": "f1",
            "EventId": 1,
            "Timestamp": "2024-01-02T03:00:00Z",
            "foo": "bar"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn successful_commit_acks() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().returning(|_| Ok(()));
        store.expect_read().returning(|_| Ok(None));
        store
            .expect_write()
            .withf(|path, contents| {
                let doc: MetadataDocument = serde_json::from_slice(contents).unwrap();
                path == "2024/1/2/3/f1/metadata.json"
                    && doc.events.len() == 1
                    && doc.events[0].properties["foo"] == json!("bar")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher_with(store, DeliveryOutcome::Ok, 5);
        assert_eq!(dispatcher.process(&event_body()).await, Disposition::Ack);
    }

    #[tokio::test]
    async fn report_event_routes_to_report_write() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().returning(|_| Ok(()));
        store.expect_exists().returning(|_| Ok(false));
        store
            .expect_write()
            .withf(|path, contents| path == "2024/1/2/3/f1/report.xml" && contents == b"<xml/>")
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher_with(store, DeliveryOutcome::Ok, 5);
        let body = serde_json::to_vec(&json!({
            "FileId": "f1",
            "EventId": 112,
            "Timestamp": "2024-01-02T03:00:00Z",
            "AnalysisReport": "<xml/>"
        }))
        .unwrap();

        assert_eq!(dispatcher.process(&body).await, Disposition::Ack);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_requeue() {
        // No store expectations: a decode failure must never reach storage.
        let dispatcher = dispatcher_with(MockDocumentStore::new(), DeliveryOutcome::JsonError, 5);
        assert_eq!(dispatcher.process(b"not json").await, Disposition::Reject);
    }

    #[tokio::test]
    async fn missing_timestamp_is_a_timestamp_error() {
        let dispatcher =
            dispatcher_with(MockDocumentStore::new(), DeliveryOutcome::TimestampError, 5);
        let body = serde_json::to_vec(&json!({ "FileId": "f1", "EventId": 1 })).unwrap();
        assert_eq!(dispatcher.process(&body).await, Disposition::Reject);
    }

    #[tokio::test]
    async fn unparseable_timestamp_is_a_timestamp_error() {
        let dispatcher =
            dispatcher_with(MockDocumentStore::new(), DeliveryOutcome::TimestampError, 5);
        let body = serde_json::to_vec(&json!({
            "FileId": "f1",
            "EventId": 1,
            "Timestamp": "yesterday"
        }))
        .unwrap();
        assert_eq!(dispatcher.process(&body).await, Disposition::Reject);
    }

    #[tokio::test]
    async fn exhausted_store_failure_requeues() {
        let mut store = MockDocumentStore::new();
        store.expect_ensure_container().returning(|_| Ok(()));
        store
            .expect_read()
            .times(2)
            .returning(|_| Err(StoreError::Unavailable("backend down".to_string())));

        let dispatcher = dispatcher_with(store, DeliveryOutcome::WriteError, 2);
        assert_eq!(dispatcher.process(&event_body()).await, Disposition::Requeue);
    }
}
