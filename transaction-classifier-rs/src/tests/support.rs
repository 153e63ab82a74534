//! Shared fixtures: a scripted provider and fast resilience settings

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::ResilientClient;
use crate::config::DispatchConfig;
use crate::core::{CallOptions, ClassifyRequest, CompletionProvider, PromptMessage};
use crate::error::Result;
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};

type Responder = Box<dyn Fn(&ClassifyRequest, usize) -> Result<String> + Send + Sync>;
type Delay = Box<dyn Fn(&ClassifyRequest) -> Duration + Send + Sync>;

/// Provider answering through a closure, recording call counts and the
/// peak number of concurrent calls
pub struct ScriptedProvider {
    responder: Responder,
    delay: Delay,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    /// `responder` receives the request and the 0-based call number
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ClassifyRequest, usize) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer with the user message content
    pub fn echo() -> Self {
        Self::new(|request, _| Ok(request.user_content().unwrap_or_default().to_string()))
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&ClassifyRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &ClassifyRequest, _options: &CallOptions) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(request, call)
    }
}

/// Settings that never wait on the limiter and back off for a millisecond
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter_fraction: 0.0,
    }
}

pub fn open_limiter() -> RateLimiterConfig {
    RateLimiterConfig {
        capacity: 10_000,
        refill_interval: Duration::from_millis(1),
    }
}

pub fn lenient_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 1_000,
        ..CircuitBreakerConfig::default()
    }
}

pub fn client_with(
    provider: Arc<dyn CompletionProvider>,
    dispatch: DispatchConfig,
    retry: RetryConfig,
) -> ResilientClient {
    ResilientClient::builder()
        .provider(provider)
        .rate_limiter(open_limiter())
        .circuit_breaker(lenient_breaker())
        .retry(retry)
        .dispatch(dispatch)
        .build()
        .expect("valid test client")
}

pub fn fast_client(provider: Arc<dyn CompletionProvider>) -> ResilientClient {
    client_with(provider, DispatchConfig::default(), fast_retry(3))
}

/// Requests whose user message is their index
pub fn numbered_requests(count: usize) -> Vec<ClassifyRequest> {
    (0..count)
        .map(|i| ClassifyRequest::new(vec![PromptMessage::user(i.to_string())]))
        .collect()
}
