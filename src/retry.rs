//! Retry with exponential backoff
//!
//! `RetryPolicy::execute` runs a fallible async operation up to
//! `max_retries + 1` times. Whether a failure is worth retrying is decided by
//! the predicate each call site passes in, so a "project not found" is never
//! retried while a driver start failure is.
//!
//! # Backoff
//!
//! | Failed attempt (0-based) | Delay before next attempt |
//! |--------------------------|---------------------------|
//! | 0 | `base` |
//! | 1 | `base * 2` |
//! | n | `min(base * 2^n, max)` |

use crate::logger::Logger;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Retry limits and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Returns a copy with a different retry count
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Delay to wait after the 0-based attempt `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Total number of invocations allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The operation failed with an error the call site does not retry
    #[error("{0}")]
    NonRetryable(#[source] E),

    /// Every allowed attempt failed; carries the last failure
    #[error("retry exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// A stop was requested while waiting between attempts
    #[error("cancelled while waiting to retry")]
    Cancelled,
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// Returns the underlying failure, if any
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::NonRetryable(e) => Some(e),
            Self::Exhausted { source, .. } => Some(source),
            Self::Cancelled => None,
        }
    }
}

/// Executes operations under a `RetryConfig`
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    logger: Arc<dyn Logger>,
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            logger,
            cancel: None,
        }
    }

    /// Makes backoff waits end early when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or runs out of attempts
    pub async fn execute<T, E, F, Fut, P>(
        &self,
        label: &str,
        is_retryable: P,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.execute_with(label, is_retryable, |_, _| {}, operation)
            .await
    }

    /// Like [`execute`](Self::execute), calling `on_retry(error, attempt)` before each backoff
    pub async fn execute_with<T, E, F, Fut, P, R>(
        &self,
        label: &str,
        is_retryable: P,
        mut on_retry: R,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        R: FnMut(&E, u32),
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !is_retryable(&error) {
                return Err(RetryError::NonRetryable(error));
            }

            if attempt + 1 >= max_attempts {
                self.logger.error(&format!(
                    "All {} attempts failed for {}",
                    max_attempts, label
                ));
                return Err(RetryError::Exhausted {
                    attempts: max_attempts,
                    source: error,
                });
            }

            let delay = self.config.delay_for(attempt);
            self.logger.warning(&format!(
                "Attempt {}/{} failed: {}. Retrying in {:.1}s...",
                attempt + 1,
                max_attempts,
                error,
                delay.as_secs_f64()
            ));

            on_retry(&error, attempt);

            if !self.backoff(delay).await {
                return Err(RetryError::Cancelled);
            }

            attempt += 1;
        }
    }

    /// Waits `delay`; returns false if cancelled first
    async fn backoff(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = cancel.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
