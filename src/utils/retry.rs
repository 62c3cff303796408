//! Retry utilities for resilient operations
//!
//! A common retry mechanism with exponential backoff, shared by the store
//! fetch path and the channel send path. Connection-reset failures get an
//! extra flat delay on top of the backoff: a peer that just dropped the
//! connection is usually shedding load and needs more than the next backoff
//! step.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Extra flat delay in milliseconds before retrying after a
    /// connection reset
    pub reset_extra_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            reset_extra_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt using exponential backoff
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }

    /// Extra flat delay applied on top of the backoff after a reset.
    pub fn reset_extra_delay(&self) -> Duration {
        Duration::from_millis(self.reset_extra_delay_ms)
    }
}

/// Execute an operation with retry logic, using a retry predicate.
///
/// Returns `Ok(T)` on success, or the last error once the error is not
/// retryable or the attempts are exhausted.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.calculate_delay(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis(),
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    warn!(error = %e, "Non-retryable error encountered");
                    return Err(e);
                }

                warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "Operation failed, will retry"
                );
                last_error = Some(e);
            }
        }
    }

    // The loop body ran at least once, so an error is always recorded.
    Err(last_error.expect("retry loop exited without an error"))
}
