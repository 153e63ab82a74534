//! Configuration management for the classification pipeline
//!
//! This module provides utilities for loading and validating the pipeline's
//! numeric tunables and provider settings, with support for environment
//! variables. The pipeline itself never reads configuration files; callers
//! hand it fully built config structs.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>().map_err(|e| {
            ClassifierError::configuration(format!("Invalid integer for key {}: {}", key, e))
        })
    }

    /// Get a float configuration value
    fn get_float(&self, key: &str) -> Result<f64> {
        let value = self.get_string(key)?;
        value.trim().parse::<f64>().map_err(|e| {
            ClassifierError::configuration(format!("Invalid float for key {}: {}", key, e))
        })
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ClassifierError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Whether the key is set at all
    fn has_key(&self, key: &str) -> bool {
        self.get_string(key).is_ok()
    }

    /// Get a float, or `default` when unset; a malformed value is an error
    fn get_float_or(&self, key: &str, default: f64) -> Result<f64> {
        if !self.has_key(key) {
            return Ok(default);
        }
        self.get_float(key)
    }

    /// Get a boolean, or `default` when unset; a malformed value is an error
    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        if !self.has_key(key) {
            return Ok(default);
        }
        self.get_bool(key)
    }

    /// Get a non-negative count, or `default` when unset
    fn get_count_or(&self, key: &str, default: usize) -> Result<usize> {
        if !self.has_key(key) {
            return Ok(default);
        }
        let value = self.get_int(key)?;
        usize::try_from(value).map_err(|_| {
            ClassifierError::configuration(format!("Negative count for key {}: {}", key, value))
        })
    }

    /// Get a millisecond duration, or `default` when unset
    fn get_millis_or(&self, key: &str, default: Duration) -> Result<Duration> {
        if !self.has_key(key) {
            return Ok(default);
        }
        let value = self.get_int(key)?;
        u64::try_from(value).map(Duration::from_millis).map_err(|_| {
            ClassifierError::configuration(format!("Negative duration for key {}: {}ms", key, value))
        })
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "LLM", "BREAKER")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub(crate) fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(
            &key.to_uppercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        );

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => ClassifierError::configuration(format!(
                "Environment variable not set: {}",
                env_key
            )),
            env::VarError::NotUnicode(_) => ClassifierError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            ClassifierError::configuration(format!("Configuration key not found: {}", key))
        })
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder-style variant of `add_provider`
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                ClassifierError::configuration(format!(
                    "Configuration key not found in any provider: {}",
                    key
                ))
            })
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix("CLASSIFIER")));

/// Trait for validated configuration sections
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Section name, used in error messages
    fn section_name(&self) -> &str;
}

/// Settings for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key
    pub api_key: String,

    /// Organization ID (optional)
    pub org_id: Option<String>,

    /// Base URL (can be changed for proxies and compatible gateways)
    pub base_url: String,

    /// Model used when a call does not override it
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Network timeout in seconds; the only hard bound on a single call
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            org_id: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_seconds: 30,
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            api_key: provider.get_string("llm_api_key")?,
            org_id: provider.get_string("llm_org_id").ok(),
            base_url: provider.get_string_or("llm_base_url", &defaults.base_url),
            model: provider.get_string_or("llm_model", &defaults.model),
            temperature: provider
                .get_float_or("llm_temperature", defaults.temperature as f64)?
                as f32,
            timeout_seconds: provider.get_count_or("llm_timeout_seconds", 30)? as u64,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for OpenAIConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ClassifierError::configuration("LLM API key is required"));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            ClassifierError::configuration(format!("Invalid LLM base URL {}: {}", self.base_url, e))
        })?;

        if self.model.is_empty() {
            return Err(ClassifierError::configuration("LLM model is required"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ClassifierError::configuration(format!(
                "LLM temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(ClassifierError::configuration("LLM timeout must be positive"));
        }

        Ok(())
    }

    fn section_name(&self) -> &str {
        "openai"
    }
}

/// Batching and concurrency bounds for outbound calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of requests dispatched per sequential group
    pub batch_size: usize,

    /// Hard ceiling on concurrent network calls
    pub max_concurrent: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent: 3,
        }
    }
}

impl ServiceConfig for DispatchConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ClassifierError::configuration("batch_size must be at least 1"));
        }
        if self.max_concurrent == 0 {
            return Err(ClassifierError::configuration("max_concurrent must be at least 1"));
        }
        Ok(())
    }

    fn section_name(&self) -> &str {
        "dispatch"
    }
}

impl ServiceConfig for RateLimiterConfig {
    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(ClassifierError::configuration("rate limiter capacity must be at least 1"));
        }
        if self.refill_interval.is_zero() {
            return Err(ClassifierError::configuration(
                "rate limiter refill interval must be positive",
            ));
        }
        Ok(())
    }

    fn section_name(&self) -> &str {
        "rate_limiter"
    }
}

impl ServiceConfig for CircuitBreakerConfig {
    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(ClassifierError::configuration(
                "circuit breaker failure threshold must be at least 1",
            ));
        }
        Ok(())
    }

    fn section_name(&self) -> &str {
        "circuit_breaker"
    }
}

impl ServiceConfig for RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(ClassifierError::configuration("max_retries must be at least 1"));
        }
        if self.base_delay > self.max_delay {
            return Err(ClassifierError::configuration(format!(
                "base_delay {:?} exceeds max_delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        if !(0.0..=0.1).contains(&self.jitter_fraction) {
            return Err(ClassifierError::configuration(format!(
                "jitter_fraction must be within 0.0..=0.1, got {}",
                self.jitter_fraction
            )));
        }
        Ok(())
    }

    fn section_name(&self) -> &str {
        "retry"
    }
}

/// Every tunable of the pipeline in one place
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    pub rate_limiter: RateLimiterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,

    /// Run the budget pass after the category pass and feed it the categories
    pub budget_uses_category_context: bool,
}

impl ClassifierConfig {
    /// Load the tunables from a config provider, falling back to defaults
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let limiter = RateLimiterConfig::default();
        let breaker = CircuitBreakerConfig::default();
        let retry = RetryConfig::default();
        let dispatch = DispatchConfig::default();

        let config = Self {
            rate_limiter: RateLimiterConfig {
                capacity: provider.get_count_or("rate_limit_capacity", limiter.capacity)?,
                refill_interval: provider
                    .get_millis_or("rate_limit_refill_interval_ms", limiter.refill_interval)?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: provider
                    .get_count_or("breaker_failure_threshold", breaker.failure_threshold)?,
                reset_timeout: provider.get_millis_or("breaker_reset_timeout_ms", breaker.reset_timeout)?,
                half_open_timeout: provider
                    .get_millis_or("breaker_half_open_timeout_ms", breaker.half_open_timeout)?,
            },
            retry: RetryConfig {
                max_retries: u32::try_from(provider.get_count_or("max_retries", retry.max_retries as usize)?)
                    .map_err(|_| ClassifierError::configuration("max_retries is out of range"))?,
                base_delay: provider.get_millis_or("base_delay_ms", retry.base_delay)?,
                max_delay: provider.get_millis_or("max_delay_ms", retry.max_delay)?,
                jitter_fraction: provider.get_float_or("jitter_fraction", retry.jitter_fraction)?,
            },
            dispatch: DispatchConfig {
                batch_size: provider.get_count_or("batch_size", dispatch.batch_size)?,
                max_concurrent: provider.get_count_or("max_concurrent", dispatch.max_concurrent)?,
            },
            budget_uses_category_context: provider
                .get_bool_or("budget_uses_category_context", false)?,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for ClassifierConfig {
    fn validate(&self) -> Result<()> {
        self.rate_limiter.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.dispatch.validate()
    }

    fn section_name(&self) -> &str {
        "classifier"
    }
}
