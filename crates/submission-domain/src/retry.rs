use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with linear backoff around transient failures.
///
/// The operation closure is re-invoked on every attempt, so callers that
/// retry a read-modify-write cycle re-read the latest state instead of
/// replaying a stale in-memory copy. The backoff wait suspends only the
/// calling task.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Run `operation` until it succeeds or `max_attempts` is reached,
    /// sleeping `attempt * base_delay` between attempts and surfacing the
    /// last error. Every failed attempt is logged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(
                        operation = %label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "attempt failed"
                    );

                    if attempt >= self.max_attempts {
                        return Err(error);
                    }

                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
