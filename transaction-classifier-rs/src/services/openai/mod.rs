//! OpenAI API provider implementation
//!
//! Talks to any OpenAI-compatible chat completions endpoint. A request that
//! carries a `FunctionSpec` is sent as a single tool with a forced
//! `tool_choice`, and the call's JSON arguments are returned as the raw
//! output.

mod models;
pub use models::*;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::config::{OpenAIConfig, ServiceConfig, DEFAULT_PROVIDER};
use crate::core::{CallOptions, ClassifyRequest, CompletionProvider};
use crate::error::mapping::is_retryable_status;
use crate::error::{ClassifierError, Result};
use crate::services::common::{build_http_client, create_error_context, parse_error_response, UserAgent};

const CHAT_ENDPOINT: &str = "chat/completions";

/// OpenAI chat completions provider
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    /// HTTP client
    http_client: Client,

    /// Configuration
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider from an explicit configuration
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("openai".to_string()),
                ..UserAgent::default()
            }),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self { http_client, config })
    }

    /// Create a provider from `CLASSIFIER_LLM_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_provider(&**DEFAULT_PROVIDER)?)
    }

    /// Active configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn build_body(&self, request: &ClassifyRequest, options: &CallOptions) -> ChatCompletionRequest {
        let (tools, tool_choice) = match &request.function {
            Some(function) => (
                Some(vec![Tool::from(function)]),
                Some(ToolChoice::function(function.name.clone())),
            ),
            None => (None, None),
        };

        ChatCompletionRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            max_tokens: options.max_tokens,
            tools,
            tool_choice,
        }
    }

    /// Send one chat completion request
    pub async fn chat_completion(&self, body: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), CHAT_ENDPOINT);
        debug!("Sending request to OpenAI: POST {}", url);

        let start_time = Instant::now();
        let mut builder = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body);

        if let Some(ref org) = self.config.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error = parse_error_response("openai", CHAT_ENDPOINT, response).await;
            if is_retryable_status(status) {
                warn!("OpenAI returned transient status {}: {}", status, error);
            }
            return Err(error);
        }

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            ClassifierError::parsing(format!("Failed to parse response: {}", e))
                .with_context(create_error_context("openai", CHAT_ENDPOINT, Some(status)))
        })?;

        debug!(
            "OpenAI answered in {:.2}ms ({} choices)",
            start_time.elapsed().as_secs_f64() * 1000.0,
            parsed.choices.len()
        );

        Ok(parsed)
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, request: &ClassifyRequest, options: &CallOptions) -> Result<String> {
        let body = self.build_body(request, options);
        let response = self.chat_completion(&body).await?;

        response
            .first_output()
            .map(str::to_string)
            .ok_or_else(|| ClassifierError::parsing("Completion carried neither a tool call nor content"))
    }
}
