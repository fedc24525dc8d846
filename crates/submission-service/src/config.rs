use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root path of the transaction store
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_nats_connect_timeout_secs")]
    pub nats_connect_timeout_secs: u64,

    /// JetStream stream name for transaction events
    #[serde(default = "default_transaction_stream")]
    pub transaction_stream: String,

    /// Subject pattern for the consumer filter
    #[serde(default = "default_transaction_subject")]
    pub transaction_subject: String,

    /// Durable consumer name
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Batch size for delivery fetches
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for a delivery batch in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Retry attempt cap for store writes
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base backoff unit in seconds (attempt N waits N x this)
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_root() -> String {
    "/var/lib/submission-service/transactions".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_connect_timeout_secs() -> u64 {
    10
}

fn default_transaction_stream() -> String {
    "transaction-events".to_string()
}

fn default_transaction_subject() -> String {
    "transaction-events.*".to_string()
}

fn default_consumer_name() -> String {
    "submission-service".to_string()
}

fn default_nats_batch_size() -> usize {
    32
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_secs() -> u64 {
    1
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::default())
            .build()?;

        config.try_deserialize()
    }
}
