//! Resilience patterns guarding the upstream model
//!
//! This module provides the building blocks that `ResilientClient` composes:
//! - Token-bucket rate limiting
//! - Circuit breaker with half-open probing
//! - Retry with capped exponential backoff and jitter

mod circuit_breaker;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{BackoffSchedule, RetryConfig, RetryExecutor};

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,

    /// Circuit is half-open, letting probe requests through
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}
