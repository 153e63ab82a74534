//! # Transaction Classifier
//!
//! Assigns a category and a budget to personal-finance transactions by
//! asking an LLM, without letting a slow, flaky or wrong model break the
//! batch.
//!
//! This crate provides:
//!
//! - A resilient client (token-bucket rate limiting, circuit breaking,
//!   capped exponential backoff, bounded concurrency)
//! - Validation of model output against a closed vocabulary, with fuzzy matching
//! - Per-label-space assignment services that degrade to "no label" instead of failing
//! - An orchestrator that merges category and budget results per record
//!
//! ## Architecture
//!
//! - `CompletionProvider`: one upstream model call (`OpenAIProvider` for
//!   OpenAI-compatible endpoints)
//! - `ResilientClient`: the only owner of limiter, breaker and in-flight state
//! - `ResponseValidator`: maps raw output onto the vocabulary
//! - `AssignmentService`: prompts, calls, validates, degrades
//! - `Orchestrator`: runs both label spaces and builds the `AssignmentMap`

pub mod core;
pub use crate::core::{CallOptions, ClassifyRequest, CompletionProvider, ResilientClientBuilder};

pub mod client;
pub use client::ResilientClient;

pub mod services;
pub use services::openai;

pub mod error;
pub use error::{ClassifierError, ErrorContext, ErrorKind, Result};

pub mod resilience;
pub use resilience::{CircuitBreaker, CircuitBreakerStatus, RateLimiter, RetryExecutor};

pub mod config;
pub use config::{ClassifierConfig, ConfigProvider, ServiceConfig};

pub mod models;
pub use models::{ClassificationRecord, ValidatedLabel, Vocabulary};

pub mod validation;
pub use validation::{EmptyResponsePolicy, ResponseValidator};

pub mod assignment;
pub use assignment::{AssignmentService, LabelSpace};

pub mod orchestrator;
pub use orchestrator::{AssignmentMap, Orchestrator, RecordAssignment};

#[cfg(test)]
mod tests;

use std::sync::Arc;

/// Create a new client builder
pub fn client() -> ResilientClientBuilder {
    ResilientClientBuilder::new()
}

/// Build an orchestrator over an OpenAI-compatible endpoint, configured from
/// `CLASSIFIER_*` environment variables
pub fn openai_pipeline() -> Result<Orchestrator> {
    let provider = &**config::DEFAULT_PROVIDER;
    let config = ClassifierConfig::from_provider(provider)?;
    let openai = config::OpenAIConfig::from_provider(provider)?;

    let client = client().config(&config).openai(openai)?.build()?;
    Ok(Orchestrator::from_config(Arc::new(client), &config))
}
