//! Fixed-delay retry for coordinated calls.

use std::future::Future;
use std::time::Duration;

use crate::traits::HttpError;

/// Bounded retry with a fixed delay between attempts.
///
/// Only [`HttpError::is_retryable`] failures are retried. Anything else is
/// the server's definitive answer and is returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Run `operation` until it succeeds, fails definitively, or the retry
    /// budget is spent. Returns the last error in the latter cases.
    pub async fn execute<F, Fut, T>(&self, key: &str, operation: F) -> Result<T, HttpError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, HttpError>>,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(key, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_retries => {
                    tracing::warn!(
                        key,
                        attempts = attempt + 1,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    tracing::debug!(
                        key,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
