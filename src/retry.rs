//! Bounded retry with fixed backoff and jittered pacing

use crate::config::RetryConfig;
use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently a remote call is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay between two attempts
    pub backoff: Duration,
    /// Lower bound of the pause after a successful call
    pub jitter_min: Duration,
    /// Upper bound of the pause after a successful call
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
            jitter_min: Duration::from_millis(200),
            jitter_max: Duration::from_millis(500),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_secs(config.backoff_secs),
            jitter_min: Duration::from_millis(config.jitter_min_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    /// Run `operation`, retrying transient errors until attempts run out
    ///
    /// Permanent errors are returned straight away. The last transient error is
    /// returned once `max_attempts` calls have failed.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name, attempt, max_attempts, e, self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    debug!(
                        "{} gave up after {} attempt(s): {}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Random pause within the jitter window
    pub fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        rand::thread_rng().gen_range(self.jitter_min..=self.jitter_max)
    }

    /// Sleep for a jittered pause to stay under provider throttling
    pub async fn pace(&self) {
        let pause = self.jitter();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}
