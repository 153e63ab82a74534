//! Error mapping for LLM provider APIs
//!
//! Converts provider error responses into the normalized `ClassifierError`,
//! so that fatality is decided here once and never by matching message text
//! further up the pipeline.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ClassifierError, ErrorContext};

/// Map a status code and message to the matching error variant
fn map_status(status: StatusCode, message: impl Into<String>) -> ClassifierError {
    let message = message.into();
    match status {
        StatusCode::UNAUTHORIZED => ClassifierError::authentication(message),
        StatusCode::FORBIDDEN => ClassifierError::authorization(message),
        StatusCode::TOO_MANY_REQUESTS => ClassifierError::rate_limit(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ClassifierError::timeout(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ClassifierError::validation(message)
        }
        StatusCode::NOT_FOUND => ClassifierError::configuration(format!(
            "Endpoint or model not found: {}",
            message
        )),
        _ => ClassifierError::service(message),
    }
}

/// Map an OpenAI-compatible API error to a ClassifierError
pub fn map_openai_error(
    status: StatusCode,
    json: &Value,
    context: &mut ErrorContext,
) -> ClassifierError {
    context.service = "openai".to_string();

    let Some(error) = json.get("error") else {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return map_status(status, message);
    };

    if let Some(error_type) = error.get("type").and_then(|t| t.as_str()) {
        context.add("error_type", error_type);
    }

    let code = error.get("code").and_then(|c| c.as_str());
    if let Some(code) = code {
        context.error_code = Some(code.to_string());
    }

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown OpenAI error");

    // Some gateways answer a bad key with 400 + invalid_api_key
    if code == Some("invalid_api_key") {
        return ClassifierError::authentication(message);
    }

    map_status(status, message)
}

/// Map a generic HTTP error to a ClassifierError
pub fn map_http_error(
    status: StatusCode,
    body: &str,
    context: &mut ErrorContext,
) -> ClassifierError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if context.service == "openai" {
            return map_openai_error(status, &json, context);
        }

        let message = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(|m| m.as_str())
            .unwrap_or(body);
        return map_status(status, message);
    }

    let message = if body.is_empty() {
        status.to_string()
    } else if body.len() > 100 {
        format!("{}: {:.100}...", status, body)
    } else {
        format!("{}: {}", status, body)
    };

    map_status(status, message)
}

/// Determine if an HTTP status code indicates a transient error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}
