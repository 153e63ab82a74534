//! Resilient dispatch of classification requests
//!
//! `ResilientClient` owns the only mutable resilience state in the pipeline:
//! the token bucket, the circuit breaker and the in-flight set. Every model
//! call goes through `classify`, which
//!
//! 1. asks the breaker for admission (a rejection is final),
//! 2. retries the call with capped exponential backoff,
//! 3. takes a rate-limiter token and an in-flight permit before each attempt,
//!    then asks the breaker again right before the network call,
//! 4. reports each outcome back to the breaker.
//!
//! Requests are dispatched in sequential groups of `batch_size`; inside a
//! group all requests are started together and the in-flight bound keeps at
//! most `max_concurrent` calls on the wire. Results are placed by index, so
//! output order always matches input order.

use std::sync::Arc;

use futures::future::join_all;
use log::debug;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::core::{CallOptions, ClassifyRequest, CompletionProvider, ResilientClientBuilder};
use crate::error::{ClassifierError, ErrorContext, Result};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerStatus,
    RateLimiter, RateLimiterConfig, RetryConfig, RetryExecutor,
};

/// Rate-limited, circuit-broken, retrying front of a `CompletionProvider`
pub struct ResilientClient {
    provider: Arc<dyn CompletionProvider>,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    retry: RetryExecutor,
    in_flight: Semaphore,
    dispatch: DispatchConfig,
}

impl ResilientClient {
    /// Create a client; prefer `ResilientClient::builder()` which validates the tunables
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        rate_limiter: RateLimiterConfig,
        circuit_breaker: CircuitBreakerConfig,
        retry: RetryConfig,
        dispatch: DispatchConfig,
    ) -> Self {
        let dispatch = DispatchConfig {
            batch_size: dispatch.batch_size.max(1),
            max_concurrent: dispatch.max_concurrent.max(1),
        };

        Self {
            provider,
            rate_limiter: RateLimiter::new(rate_limiter),
            circuit_breaker: CircuitBreaker::new(circuit_breaker),
            retry: RetryExecutor::new(retry),
            in_flight: Semaphore::new(dispatch.max_concurrent),
            dispatch,
        }
    }

    /// Create a new builder
    pub fn builder() -> ResilientClientBuilder {
        ResilientClientBuilder::new()
    }

    /// Run every request through the resilience stack.
    ///
    /// Returns one raw output per request, in request order. The first failed
    /// request (by index) fails the whole call; later groups are not started.
    #[tracing::instrument(skip_all, fields(requests = requests.len()))]
    pub async fn classify(
        &self,
        requests: Vec<ClassifyRequest>,
        overrides: Option<CallOptions>,
    ) -> Result<Vec<String>> {
        let request_id = Uuid::new_v4().to_string();
        let options = overrides.unwrap_or_default();
        let mut outputs = Vec::with_capacity(requests.len());

        for (group_index, group) in requests.chunks(self.dispatch.batch_size).enumerate() {
            debug!(
                "[{}] dispatching group {} with {} requests",
                request_id,
                group_index,
                group.len()
            );

            let results = join_all(group.iter().map(|request| self.dispatch_one(request, &options))).await;

            for (offset, result) in results.into_iter().enumerate() {
                let index = group_index * self.dispatch.batch_size + offset;
                let output = result.map_err(|err| {
                    err.with_context(
                        ErrorContext::for_service("resilient_client")
                            .request_id(request_id.as_str())
                            .with("request_index", index),
                    )
                })?;
                outputs.push(output);
            }
        }

        Ok(outputs)
    }

    async fn dispatch_one(&self, request: &ClassifyRequest, options: &CallOptions) -> Result<String> {
        self.circuit_breaker.check_admit()?;

        self.retry
            .execute_while(
                |attempt| async move {
                    self.rate_limiter.acquire().await;

                    // the permit returns to the set when dropped, whatever the outcome
                    let _permit = self
                        .in_flight
                        .acquire()
                        .await
                        .map_err(|_| ClassifierError::internal("in-flight set closed"))?;

                    // the circuit may have opened while this attempt was queued
                    self.circuit_breaker.check_admit()?;

                    match self.provider.complete(request, options).await {
                        Ok(output) => {
                            self.circuit_breaker.on_success();
                            Ok(output)
                        }
                        Err(err) => {
                            debug!("model call failed on attempt {}: {}", attempt, err);
                            self.circuit_breaker.on_failure();
                            Err(err)
                        }
                    }
                },
                |err| !err.is_circuit_open(),
            )
            .await
    }

    /// Current circuit breaker status
    pub fn circuit_status(&self) -> CircuitBreakerStatus {
        self.circuit_breaker.status()
    }

    /// Circuit breaker metrics snapshot
    pub fn circuit_metrics(&self) -> CircuitBreakerMetrics {
        self.circuit_breaker.metrics()
    }

    /// Close the circuit and forget past failures
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    /// Number of model calls currently on the wire
    pub fn in_flight(&self) -> usize {
        self.dispatch.max_concurrent - self.in_flight.available_permits()
    }

    /// The token bucket guarding this client
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Active batching and concurrency bounds
    pub fn dispatch_config(&self) -> DispatchConfig {
        self.dispatch
    }
}
