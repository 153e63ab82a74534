//! Retry with capped exponential backoff
//!
//! Attempt `n` (1-based) that fails is followed by a sleep of
//! `min(base_delay * 2^(n-1) + jitter, max_delay)`, where the jitter is a
//! random slice of at most `jitter_fraction * base_delay`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use rand::Rng;

use crate::error::{ClassifierError, Result};

/// Retry policy configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts per request, the first one included
    pub max_retries: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Jitter as a fraction of `base_delay`, at most 0.1
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_fraction: 0.1,
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_retries: {}, base_delay: {:?}, max_delay: {:?}, jitter_fraction: {} }}",
            self.max_retries, self.base_delay, self.max_delay, self.jitter_fraction
        )
    }
}

/// Successive retry delays for one request
pub struct BackoffSchedule {
    exponential: ExponentialBackoff,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl BackoffSchedule {
    /// Start a fresh schedule
    pub fn new(config: &RetryConfig) -> Self {
        let exponential = ExponentialBackoff {
            current_interval: config.base_delay,
            initial_interval: config.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: config.max_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        Self {
            exponential,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter_fraction: config.jitter_fraction.clamp(0.0, 0.1),
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let exponential = self.exponential.next_backoff().unwrap_or(self.max_delay);
        let jitter = if self.jitter_fraction > 0.0 {
            self.base_delay
                .mul_f64(rand::thread_rng().gen_range(0.0..=self.jitter_fraction))
        } else {
            Duration::ZERO
        };

        (exponential + jitter).min(self.max_delay)
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the specified configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// The operation receives the 1-based attempt number. Every error is
    /// retried; deciding which failures are fatal is left to the caller.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_while(operation, |_| true).await
    }

    /// Like `execute`, but an error for which `should_retry` is false is
    /// returned at once without consuming the remaining attempts
    pub async fn execute_while<F, Fut, T, P>(&self, mut operation: F, should_retry: P) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ClassifierError) -> bool,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut schedule = BackoffSchedule::new(&self.config);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && should_retry(&err) => {
                    let delay = schedule.next_delay();
                    log::warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if attempt > 1 => {
                    return Err(err.with_context_value("attempts", attempt));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Get the current retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
