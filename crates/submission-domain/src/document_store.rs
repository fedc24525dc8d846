use crate::error::StoreResult;
use async_trait::async_trait;

/// Capability set required of a hierarchical document storage backend.
///
/// Paths are `/`-separated relative keys; the backend owns physical I/O and
/// knows nothing about document semantics. A local filesystem and a networked
/// file share both satisfy this contract by composing `ensure_container`
/// from the path's segments before the first write.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether a document exists at `path`.
    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Read the document at `path`, or `None` when absent.
    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `contents` to `path`, replacing any existing document.
    async fn write(&self, path: &str, contents: Vec<u8>) -> StoreResult<()>;

    /// Idempotently create every missing intermediate segment of `path`,
    /// tolerating already-exists races from concurrent writers.
    async fn ensure_container(&self, path: &str) -> StoreResult<()>;
}
