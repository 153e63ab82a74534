//! Error handling for the transaction classifier
//!
//! This module provides the error system shared by every pipeline stage:
//! - Categorizes errors by type (network, auth, rate limit, invalid label, etc.)
//! - Classifies each error as fatal, retryable or recoverable at the point it is built
//! - Adds rich context to errors for better debugging
//! - Provides convenient Result type alias

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

/// Result type for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// How the pipeline should react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot be fixed by retrying or defaulting; aborts the run
    Fatal,

    /// Transient upstream trouble; worth another attempt
    Retryable,

    /// Not transient, but safe to replace with a default label
    Recoverable,
}

/// Main error type for the transaction classifier
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Upstream rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Provider-side failures (5xx and friends)
    #[error("Service error: {0}")]
    Service(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (permission issues)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The circuit breaker rejected the call before it reached the network
    #[error("Circuit open: {0}")]
    CircuitOpen(String),

    /// The model answered with a label outside the vocabulary
    #[error("Invalid label {value:?}; allowed labels: [{}]", .allowed.join(", "))]
    InvalidLabel { value: String, allowed: Vec<String> },

    /// One element of a batch failed validation
    #[error("Batch item {index} failed: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<ClassifierError>,
    },

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ClassifierError>,
        context: ErrorContext,
    },
}

impl ClassifierError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ClassifierError::Network(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ClassifierError::Timeout(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        ClassifierError::RateLimit(message.into())
    }

    /// Create a service error
    pub fn service(message: impl Into<String>) -> Self {
        ClassifierError::Service(message.into())
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        ClassifierError::Authentication(message.into())
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        ClassifierError::Authorization(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ClassifierError::Validation(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ClassifierError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ClassifierError::Configuration(message.into())
    }

    /// Create a circuit open error
    pub fn circuit_open(message: impl Into<String>) -> Self {
        ClassifierError::CircuitOpen(message.into())
    }

    /// Create an invalid label error
    pub fn invalid_label(value: impl Into<String>, allowed: &[String]) -> Self {
        ClassifierError::InvalidLabel {
            value: value.into(),
            allowed: allowed.to_vec(),
        }
    }

    /// Wrap the failure of one batch element
    pub fn batch_item(index: usize, source: ClassifierError) -> Self {
        ClassifierError::BatchItem {
            index,
            source: Box::new(source),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ClassifierError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ClassifierError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifierError::Authentication(_)
            | ClassifierError::Authorization(_)
            | ClassifierError::Configuration(_) => ErrorKind::Fatal,
            ClassifierError::Network(_)
            | ClassifierError::Timeout(_)
            | ClassifierError::RateLimit(_)
            | ClassifierError::Service(_)
            | ClassifierError::CircuitOpen(_) => ErrorKind::Retryable,
            ClassifierError::BatchItem { source, .. } => source.kind(),
            ClassifierError::WithContext { inner, .. } => inner.kind(),
            _ => ErrorKind::Recoverable,
        }
    }

    /// Check if this error must abort the run
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Check if this is a transient error
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Check if the breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        match self {
            ClassifierError::CircuitOpen(_) => true,
            ClassifierError::WithContext { inner, .. } => inner.is_circuit_open(),
            _ => false,
        }
    }

    /// The innermost error, with context layers peeled off
    pub fn root(&self) -> &ClassifierError {
        match self {
            ClassifierError::WithContext { inner, .. } => inner.root(),
            _ => self,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClassifierError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Get the service name if available
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ClassifierError::WithContext { context, .. } => Some(&context.service),
            _ => None,
        }
    }

    /// Get the provider error code if available
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ClassifierError::WithContext { context, inner } => {
                context.error_code.as_deref().or_else(|| inner.error_code())
            }
            _ => None,
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// Time the error was observed
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Provider-specific error code
    pub error_code: Option<String>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            request_id: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add an error code
    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to ClassifierError
impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let error = if err.is_timeout() {
            ClassifierError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ClassifierError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            ClassifierError::network(format!("Request failed: {}", err))
        } else if err.is_decode() {
            ClassifierError::parsing(format!("Response decode error: {}", err))
        } else {
            ClassifierError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            error.with_context(context.status_code(status.as_u16()))
        } else {
            error.with_context(context)
        }
    }
}

/// Convert serde_json errors to ClassifierError
impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ClassifierError::authentication("bad key").kind(), ErrorKind::Fatal);
        assert_eq!(ClassifierError::authorization("forbidden").kind(), ErrorKind::Fatal);
        assert_eq!(ClassifierError::configuration("empty").kind(), ErrorKind::Fatal);
        assert_eq!(ClassifierError::network("reset").kind(), ErrorKind::Retryable);
        assert_eq!(ClassifierError::circuit_open("open").kind(), ErrorKind::Retryable);
        assert_eq!(ClassifierError::parsing("garbage").kind(), ErrorKind::Recoverable);
        assert_eq!(
            ClassifierError::invalid_label("Utilities", &["Food".to_string()]).kind(),
            ErrorKind::Recoverable
        );
    }

    #[test]
    fn test_kind_sees_through_wrappers() {
        let wrapped = ClassifierError::authentication("expired")
            .with_context(ErrorContext::for_service("openai").status_code(401));
        assert!(wrapped.is_fatal());
        assert_eq!(wrapped.status_code(), Some(401));
        assert_eq!(wrapped.service_name(), Some("openai"));

        let batch = ClassifierError::batch_item(2, ClassifierError::timeout("slow"));
        assert!(batch.is_retryable());
    }

    #[test]
    fn test_invalid_label_message_names_value_and_vocabulary() {
        let err = ClassifierError::invalid_label(
            "Utilities",
            &["Food".to_string(), "Medical".to_string()],
        );
        let message = err.to_string();
        assert!(message.contains("\"Utilities\""));
        assert!(message.contains("Food, Medical"));
    }
}
