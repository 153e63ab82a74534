//! Token-bucket rate limiter
//!
//! The bucket holds at most `capacity` tokens. Once `refill_interval` has
//! passed since the last refill, the next acquire tops it back up. A caller
//! that finds the bucket empty sleeps until the next refill is due and then
//! checks again; it is delayed, never rejected.

use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum burst size
    pub capacity: usize,

    /// Time between refills
    pub refill_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: usize,
    last_refill: Instant,
}

/// Gate bounding the outbound call rate
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a limiter with a full bucket
    pub fn new(config: RateLimiterConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            config: RateLimiterConfig { capacity, ..config },
        }
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill);

                if elapsed >= self.config.refill_interval {
                    state.tokens = self
                        .config
                        .capacity
                        .min(state.tokens + self.config.capacity);
                    state.last_refill = now;
                }

                if state.tokens > 0 {
                    state.tokens -= 1;
                    return;
                }

                self.config.refill_interval.saturating_sub(elapsed)
            };

            debug!("Rate limiter empty, waiting {:?} for refill", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently in the bucket, without applying a pending refill
    pub async fn available_tokens(&self) -> usize {
        self.state.lock().await.tokens
    }

    /// Maximum number of tokens
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Active configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}
