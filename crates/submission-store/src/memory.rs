use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use submission_domain::{DocumentStore, StoreError, StoreResult};
use tokio::sync::RwLock;

/// In-memory document store for tests and local experiments.
///
/// Supports injecting a number of transient write failures to exercise
/// retry behavior without a flaky backend.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
    containers: RwLock<HashSet<String>>,
    write_failures: AtomicU32,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with `StoreError::Unavailable`.
    pub fn inject_write_failures(&self, count: u32) {
        self.write_failures.store(count, Ordering::SeqCst);
    }

    pub async fn document(&self, path: &str) -> Option<Vec<u8>> {
        self.documents.read().await.get(path).cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.documents.read().await.contains_key(path))
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn write(&self, path: &str, contents: Vec<u8>) -> StoreResult<()> {
        let remaining = self.write_failures.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .write_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }

        self.documents.write().await.insert(path.to_string(), contents);
        Ok(())
    }

    async fn ensure_container(&self, path: &str) -> StoreResult<()> {
        let mut containers = self.containers.write().await;
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            containers.insert(current.clone());
        }
        Ok(())
    }
}
