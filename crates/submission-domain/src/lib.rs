pub mod aggregator;
pub mod document_store;
pub mod envelope;
pub mod error;
pub mod retry;
pub mod storage_key;

pub use aggregator::*;
pub use document_store::*;
pub use envelope::*;
pub use error::*;
pub use retry::*;
pub use storage_key::*;
