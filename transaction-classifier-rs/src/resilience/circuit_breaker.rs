//! Circuit breaker for a degraded upstream model
//!
//! Consecutive failures open the circuit; while open, calls are rejected
//! without touching the network. After `reset_timeout` the next admission
//! moves the breaker to half-open and lets a probe through. A successful
//! probe closes the circuit, as does a quiet `half_open_timeout` with no new
//! failure. A failed probe opens it again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ClassifierError, Result};

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: usize,

    /// How long the circuit stays open before a probe is allowed
    pub reset_timeout: Duration,

    /// Quiet period in half-open after which the circuit closes on its own
    pub half_open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitBreakerStatus,
    consecutive_failures: usize,
    last_failure_at: Option<Instant>,
    total_failures: usize,
    total_successes: usize,
    total_rejections: usize,
}

impl BreakerState {
    fn since_last_failure(&self, now: Instant) -> Option<Duration> {
        self.last_failure_at.map(|at| now.duration_since(at))
    }
}

/// A thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the specified configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                status: CircuitBreakerStatus::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                total_failures: 0,
                total_successes: 0,
                total_rejections: 0,
            }),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may proceed, applying any due transition first
    pub fn check_admit(&self) -> Result<()> {
        let mut state = self.lock();
        let now = Instant::now();

        match state.status {
            CircuitBreakerStatus::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold {
                    log::warn!(
                        "Circuit breaker opening after {} consecutive failures",
                        state.consecutive_failures
                    );
                    state.status = CircuitBreakerStatus::Open;
                    state.last_failure_at = Some(now);
                    state.total_rejections += 1;
                    return Err(ClassifierError::circuit_open(format!(
                        "{} consecutive failures, rejecting calls for {:?}",
                        state.consecutive_failures, self.config.reset_timeout
                    )));
                }
                Ok(())
            }
            CircuitBreakerStatus::Open => match state.since_last_failure(now) {
                Some(elapsed) if elapsed <= self.config.reset_timeout => {
                    state.total_rejections += 1;
                    Err(ClassifierError::circuit_open(format!(
                        "rejecting calls for another {:?}",
                        self.config.reset_timeout - elapsed
                    )))
                }
                _ => {
                    log::info!("Circuit breaker transitioning to Half-Open state");
                    state.status = CircuitBreakerStatus::HalfOpen;
                    Ok(())
                }
            },
            CircuitBreakerStatus::HalfOpen => {
                let quiet = state
                    .since_last_failure(now)
                    .map_or(true, |elapsed| elapsed > self.config.half_open_timeout);
                if quiet {
                    log::info!("Circuit breaker closing after a quiet half-open period");
                    state.status = CircuitBreakerStatus::Closed;
                    state.consecutive_failures = 0;
                }
                Ok(())
            }
        }
    }

    /// Record a successful call
    pub fn on_success(&self) {
        let mut state = self.lock();
        state.total_successes += 1;

        match state.status {
            CircuitBreakerStatus::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitBreakerStatus::HalfOpen => {
                log::info!("Circuit breaker probe succeeded, transitioning to Closed state");
                state.status = CircuitBreakerStatus::Closed;
                state.consecutive_failures = 0;
            }
            CircuitBreakerStatus::Open => {
                // a call admitted before the circuit opened finished late
                log::debug!("Received success in Open state, ignoring");
            }
        }
    }

    /// Record a failed call
    pub fn on_failure(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        state.total_failures += 1;

        match state.status {
            CircuitBreakerStatus::Closed => {
                state.consecutive_failures += 1;
                state.last_failure_at = Some(now);
                if state.consecutive_failures >= self.config.failure_threshold {
                    log::warn!(
                        "Circuit breaker transitioning to Open state after {} consecutive failures",
                        state.consecutive_failures
                    );
                    state.status = CircuitBreakerStatus::Open;
                }
            }
            CircuitBreakerStatus::HalfOpen => {
                state.consecutive_failures += 1;
                state.last_failure_at = Some(now);
                log::warn!("Circuit breaker probe failed, transitioning back to Open state");
                state.status = CircuitBreakerStatus::Open;
            }
            CircuitBreakerStatus::Open => {
                state.consecutive_failures += 1;
                log::debug!("Received failure in Open state");
            }
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.lock();
        state.status = CircuitBreakerStatus::Closed;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
    }

    /// Get the current circuit status
    pub fn status(&self) -> CircuitBreakerStatus {
        self.lock().status
    }

    /// Get the current number of consecutive failures
    pub fn consecutive_failures(&self) -> usize {
        self.lock().consecutive_failures
    }

    /// Active configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get a metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
            total_rejections: state.total_rejections,
            since_last_failure: state.since_last_failure(Instant::now()),
        }
    }
}

/// Metrics for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub status: CircuitBreakerStatus,
    pub consecutive_failures: usize,
    pub total_failures: usize,
    pub total_successes: usize,

    /// Calls turned away without a network attempt
    pub total_rejections: usize,

    pub since_last_failure: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn breaker(threshold: usize, reset_ms: u64, half_open_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: Duration::from_millis(reset_ms),
            half_open_timeout: Duration::from_millis(half_open_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_closed_initially() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check_admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, 10_000, 10_000);

        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check_admit().is_ok());

        cb.on_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        let err = cb.check_admit().unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(cb.metrics().total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, 10_000, 10_000);
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        assert_eq!(cb.consecutive_failures(), 0);

        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_moves_to_half_open_after_reset_timeout() {
        let cb = breaker(1, 50, 10_000);
        cb.on_failure();
        assert!(cb.check_admit().is_err());

        advance(Duration::from_millis(80)).await;

        assert!(cb.check_admit().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_in_half_open_closes() {
        let cb = breaker(2, 20, 10_000);
        cb.on_failure();
        cb.on_failure();
        advance(Duration::from_millis(40)).await;
        cb.check_admit().unwrap();
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);

        cb.on_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_in_half_open_reopens() {
        let cb = breaker(1, 20, 10_000);
        cb.on_failure();
        advance(Duration::from_millis(40)).await;
        cb.check_admit().unwrap();

        cb.on_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);
        assert!(cb.check_admit().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_half_open_period_closes() {
        let cb = breaker(1, 20, 30);
        cb.on_failure();
        advance(Duration::from_millis(40)).await;
        cb.check_admit().unwrap();
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);

        advance(Duration::from_millis(10)).await;
        cb.check_admit().unwrap();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let cb = breaker(1, 10_000, 10_000);
        cb.on_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        cb.reset();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.check_admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_timeout_follows_the_runtime_clock() {
        let cb = breaker(1, 30_000, 10_000);
        cb.on_failure();

        advance(Duration::from_secs(29)).await;
        assert!(cb.check_admit().is_err());
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        advance(Duration::from_secs(2)).await;
        assert!(cb.check_admit().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
    }
}
