//! Shared error types and backend error-body parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RFC7807 Problem Details (application/problem+json)
///
/// Some gateways in front of the backend answer with this envelope instead
/// of the usual `{"detail": ...}` body; both are understood by
/// [`try_error_detail`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Extract a user-facing message from an error response body.
///
/// Prefers a string `detail`, then the `msg` entries of a validation error
/// list, then the problem `title`.
pub fn try_error_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;
    match parsed.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => {
            return Some(detail.clone());
        }
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }
    let problem = serde_json::from_value::<ProblemDetails>(parsed).ok()?;
    if !problem.title.trim().is_empty() {
        return Some(problem.title);
    }
    None
}

/// Status band of a failed request, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
    Client,
    Network,
    Decode,
}

impl ErrorClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorClass::Unauthorized,
            403 => ErrorClass::Forbidden,
            404 => ErrorClass::NotFound,
            s if s >= 500 => ErrorClass::Server,
            _ => ErrorClass::Client,
        }
    }
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Network(_) => ErrorClass::Network,
            ApiError::Http { status, .. } => ErrorClass::from_status(*status),
            ApiError::Deserialize(_) => ErrorClass::Decode,
        }
    }

    /// Backend-provided detail message, when the body carries one.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Http { body, .. } => try_error_detail(body),
            _ => None,
        }
    }

    /// The detail message, or `fallback` when the backend gave none.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail().unwrap_or_else(|| fallback.to_string())
    }
}
