//! Exponential backoff for transient upstream failures
//!
//! The delay schedule is a pure function so it can be tested without sleeping;
//! the actual waiting goes through a [`Sleeper`] that tests replace.

use crate::config::UpstreamConfig;
use crate::discovery::types::{QueryCounters, UpstreamError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Hard ceiling on retries, whatever the configuration says
pub const MAX_RETRIES: u32 = 10;

/// Retry schedule for a single upstream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            initial_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before the next attempt, or `None` once retries are spent
    ///
    /// # Arguments
    ///
    /// * `failed_attempts` - Attempts that have failed so far (starting at 1)
    /// * `prior_delay` - Delay used before the previous retry, if any
    pub fn next_delay(&self, failed_attempts: u32, prior_delay: Option<Duration>) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts > self.max_retries {
            return None;
        }

        let delay = match prior_delay {
            Some(prior) => prior.saturating_mul(2),
            None => self.initial_delay,
        };

        Some(delay.min(self.max_delay))
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Something that can wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `operation` until it succeeds, fails fatally, or the policy gives up
///
/// Non-transient errors are returned as-is on the first occurrence. Transient
/// errors that outlast the policy are wrapped in
/// [`UpstreamError::RetriesExhausted`].
pub async fn retry_transient<T, F, Fut>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    counters: &QueryCounters,
    what: &str,
    mut operation: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut failed_attempts = 0;
    let mut prior_delay = None;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        failed_attempts += 1;
        counters.record_transient_error();

        match policy.next_delay(failed_attempts, prior_delay) {
            Some(delay) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    failed_attempts,
                    policy.max_attempts(),
                    error,
                    delay
                );
                counters.record_retry();
                sleeper.sleep(delay).await;
                prior_delay = Some(delay);
            }
            None => {
                return Err(UpstreamError::RetriesExhausted {
                    attempts: failed_attempts,
                    last: Box::new(error),
                });
            }
        }
    }
}
