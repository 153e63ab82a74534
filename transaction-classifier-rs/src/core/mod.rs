//! Core abstractions for the classification pipeline
//!
//! This module provides the provider-neutral request types and the seam
//! every upstream model sits behind:
//!
//! - `CompletionProvider`: issues one model call and returns its raw text
//! - `ClassifyRequest`: role-tagged messages plus an optional function schema
//! - `CallOptions`: per-call overrides (model, temperature, token budget)
//! - `ResilientClientBuilder`: assembles a `ResilientClient` from its parts

pub mod builder;
pub use builder::ResilientClientBuilder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

/// A role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// A function the model is asked to call, described by a JSON schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,

    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// One unit of work for the upstream model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub messages: Vec<PromptMessage>,

    /// When set, the provider should force a call to this function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionSpec>,
}

impl ClassifyRequest {
    pub fn new(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            function: None,
        }
    }

    pub fn with_function(mut self, function: FunctionSpec) -> Self {
        self.function = Some(function);
        self
    }

    /// Content of the last user message, if any
    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == PromptRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Per-call overrides of the provider defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// An upstream model endpoint
///
/// Implementations perform exactly one network call per `complete` and
/// never retry on their own; retry, rate limiting and circuit breaking
/// belong to `ResilientClient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one request and return the raw model output.
    ///
    /// For a request carrying a function schema the output is the
    /// function-call arguments JSON; otherwise it is the message text.
    async fn complete(&self, request: &ClassifyRequest, options: &CallOptions) -> Result<String>;
}
