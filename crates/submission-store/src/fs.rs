use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use submission_domain::{DocumentStore, StoreError, StoreResult};
use tracing::debug;

/// Document store over a local filesystem root.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn map_io_error(error: std::io::Error) -> StoreError {
    match error.kind() {
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(error.to_string()),
        _ => StoreError::Unavailable(error.to_string()),
    }
}

#[async_trait]
impl DocumentStore for LocalFileStore {
    async fn exists(&self, path: &str) -> StoreResult<bool> {
        match tokio::fs::metadata(self.absolute(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io_error(e)),
        }
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.absolute(path)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_error(e)),
        }
    }

    async fn write(&self, path: &str, contents: Vec<u8>) -> StoreResult<()> {
        tokio::fs::write(self.absolute(path), contents)
            .await
            .map_err(map_io_error)
    }

    async fn ensure_container(&self, path: &str) -> StoreResult<()> {
        // Created segment by segment, the same way a networked file share
        // backend has to build its directory hierarchy. A concurrent writer
        // may win the race for any segment; that is not an error.
        let mut current = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push(segment);
            match tokio::fs::create_dir(&current).await {
                Ok(()) => debug!(path = %current.display(), "created container segment"),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(map_io_error(e)),
            }
        }
        Ok(())
    }
}
