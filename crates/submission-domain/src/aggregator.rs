use crate::document_store::DocumentStore;
use crate::envelope::{EventRecord, MetadataDocument};
use crate::error::{DomainError, DomainResult};
use crate::retry::RetryPolicy;
use crate::storage_key::StorageKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Owns the durable-write protocol for per-key aggregate documents.
///
/// The backend offers neither atomic append nor an optimistic-concurrency
/// token, so concurrent writers to one key would lose updates between the
/// read and the write-back. A per-key mutex serializes the read-modify-write
/// cycle for each storage key; different keys proceed independently.
pub struct TransactionAggregator {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransactionAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Append one event record to the aggregate document at `key`.
    ///
    /// The whole ensure/read/append/write cycle runs under the retry policy
    /// as a unit, so every attempt re-reads the latest document state. A
    /// missing document is treated as empty, not as an error.
    #[instrument(skip(self, record), fields(key = %key))]
    pub async fn append_event(&self, key: &StorageKey, record: EventRecord) -> DomainResult<()> {
        let lock = self.key_lock(key.as_str()).await;
        let _guard = lock.lock().await;

        let store = &self.store;
        let record = &record;

        self.retry
            .run("append event", || async move {
                store.ensure_container(key.as_str()).await?;

                let path = key.metadata_path();
                let mut document = match store.read(&path).await? {
                    Some(bytes) => serde_json::from_slice::<MetadataDocument>(&bytes).map_err(
                        |e| DomainError::CorruptDocument {
                            path: path.clone(),
                            source: e,
                        },
                    )?,
                    None => MetadataDocument::default(),
                };

                document.events.push(record.clone());
                let encoded = serde_json::to_vec(&document).map_err(DomainError::Encode)?;
                store.write(&path, encoded).await?;

                debug!(key = %key, events = document.events.len(), "event committed");
                Ok(())
            })
            .await
    }

    /// Ensure a report artifact exists at `key` with the given content.
    ///
    /// Write-once: if an artifact is already present the call succeeds
    /// without touching it, so a redelivered or concurrent report event is a
    /// no-op rather than an overwrite.
    #[instrument(skip(self, report), fields(key = %key))]
    pub async fn write_report_once(&self, key: &StorageKey, report: &str) -> DomainResult<()> {
        let lock = self.key_lock(key.as_str()).await;
        let _guard = lock.lock().await;

        let store = &self.store;

        self.retry
            .run("write report", || async move {
                store.ensure_container(key.as_str()).await?;

                let path = key.report_path();
                if store.exists(&path).await? {
                    debug!(key = %key, "report already present, skipping");
                    return Ok(());
                }

                store.write(&path, report.as_bytes().to_vec()).await?;
                debug!(key = %key, "report committed");
                Ok(())
            })
            .await
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}
