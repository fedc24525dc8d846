use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by a [`crate::DocumentStore`] backend.
///
/// Absence of a document is not an error; `read` reports it as `None`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend denied access: {0}")]
    PermissionDenied(String),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("malformed event envelope: {0}")]
    Decode(String),

    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("document at {path} is not valid JSON: {source}")]
    CorruptDocument {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to encode aggregate document: {0}")]
    Encode(serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
