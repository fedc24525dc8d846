use std::time::Duration;
use tracing::info;

/// Terminal classification of one processed delivery, used as the metrics
/// counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ok,
    JsonError,
    TimestampError,
    WriteError,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Ok => "ok",
            DeliveryOutcome::JsonError => "json_error",
            DeliveryOutcome::TimestampError => "timestamp_error",
            DeliveryOutcome::WriteError => "write_error",
        }
    }
}

/// Injected metrics collaborator. The dispatcher reports every delivery's
/// outcome and processing time here; the transport (counters, histograms)
/// belongs to the observer implementation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait OutcomeObserver: Send + Sync {
    fn delivery_processed(&self, outcome: DeliveryOutcome, elapsed: Duration);
}

/// Observer that reports outcomes as structured log events.
pub struct LogOutcomeObserver;

impl OutcomeObserver for LogOutcomeObserver {
    fn delivery_processed(&self, outcome: DeliveryOutcome, elapsed: Duration) {
        info!(
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "delivery processed"
        );
    }
}
