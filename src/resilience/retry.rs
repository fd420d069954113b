//! Retry with exponential backoff
//!
//! A failed node attempt is retried up to `max_retries` times, so a node is
//! invoked at most `max_retries + 1` times. Only [`NodeError::is_retryable`]
//! failures are retried, and the backoff sleep gives way to cancellation.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry (ms)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries (ms)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each time)
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0) to add randomness
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor (clamped to 0.0..=1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// No delay between attempts (tests, CPU-bound behaviors)
    pub fn immediate(self) -> Self {
        self.with_initial_delay(Duration::ZERO).with_jitter(0.0)
    }
}

/// Result of [`RetryPolicy::execute`]
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, NodeError>,
    /// Invocations made, including the first
    pub attempts: u32,
}

/// Retry policy that executes node attempts with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate delay for a given retry (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        let jittered_delay = if self.config.jitter > 0.0 {
            let jitter_range = capped_delay * self.config.jitter;
            let jitter_offset = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
            (capped_delay + jitter_offset).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(jittered_delay as u64)
    }

    /// Run `operation` until it succeeds, fails terminally, or retries run out
    ///
    /// `operation` receives the 1-based attempt number. `on_retry` is called
    /// before each backoff sleep with the attempt that failed.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut on_retry: impl FnMut(u32, &NodeError, Duration),
    ) -> Attempted<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match operation(attempt).await {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt > self.config.max_retries || cancel.is_cancelled() {
                return Attempted {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            let delay = self.calculate_delay(attempt - 1);
            on_retry(attempt, &err, delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Attempted {
                        result: Err(NodeError::Cancelled),
                        attempts: attempt,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
