//! Client builder implementation
//!
//! Provides a builder for assembling a `ResilientClient` from a provider and
//! the resilience tunables.

use std::sync::Arc;

use crate::client::ResilientClient;
use crate::config::{ClassifierConfig, DispatchConfig, OpenAIConfig, ServiceConfig};
use crate::core::CompletionProvider;
use crate::error::{ClassifierError, Result};
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use crate::services::openai::OpenAIProvider;

/// Builder for `ResilientClient`
#[derive(Default)]
pub struct ResilientClientBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    rate_limiter: RateLimiterConfig,
    circuit_breaker: CircuitBreakerConfig,
    retry: RetryConfig,
    dispatch: DispatchConfig,
}

impl ResilientClientBuilder {
    /// Create a new builder with default tunables
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every tunable from an aggregated config
    pub fn config(mut self, config: &ClassifierConfig) -> Self {
        self.rate_limiter = config.rate_limiter;
        self.circuit_breaker = config.circuit_breaker;
        self.retry = config.retry;
        self.dispatch = config.dispatch;
        self
    }

    /// Use an already constructed provider
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use an OpenAI-compatible endpoint as the provider
    pub fn openai(self, config: OpenAIConfig) -> Result<Self> {
        let provider = OpenAIProvider::new(config)?;
        Ok(self.provider(Arc::new(provider)))
    }

    /// Configure the token bucket
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter = config;
        self
    }

    /// Configure the circuit breaker
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Configure retry behavior
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Configure batching and the concurrency bound
    pub fn dispatch(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    /// Validate the tunables and build the client
    pub fn build(self) -> Result<ResilientClient> {
        let provider = self
            .provider
            .ok_or_else(|| ClassifierError::configuration("A completion provider is required"))?;

        self.rate_limiter.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.dispatch.validate()?;

        Ok(ResilientClient::new(
            provider,
            self.rate_limiter,
            self.circuit_breaker,
            self.retry,
            self.dispatch,
        ))
    }
}
