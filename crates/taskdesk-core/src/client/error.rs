//! Structured errors surfaced by the request pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of API failures for consistent presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// 401: credentials missing, expired or rejected
    Unauthorized,
    /// 400/422 with field-level messages
    Validation,
    /// 404: the record does not exist (anymore)
    NotFound,
    /// Any other non-success HTTP status
    Http,
    /// Connection failure or timeout
    Network,
    /// Response body did not match the expected shape
    Parse,
    /// Local token store could not be read or written
    Storage,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Unauthorized => write!(f, "unauthorized"),
            ApiErrorKind::Validation => write!(f, "validation"),
            ApiErrorKind::NotFound => write!(f, "not_found"),
            ApiErrorKind::Http => write!(f, "http_status"),
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Storage => write!(f, "storage"),
        }
    }
}

/// Error returned by every API call.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Message supplied by the server (`detail`, `error`, `message`, or
    /// aggregated field errors), if any
    pub server_message: Option<String>,
    /// Optional additional details (raw body, follow-up failures)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            server_message: None,
            details: None,
        }
    }

    /// Classifies a non-success response by status and body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 => ApiErrorKind::Unauthorized,
            404 => ApiErrorKind::NotFound,
            400 | 422 => ApiErrorKind::Validation,
            _ => ApiErrorKind::Http,
        };

        let server_message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| extract_server_message(&json));

        let message = match &server_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };

        Self {
            kind,
            status: Some(status),
            message,
            server_message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    /// Consumes a non-success response into an error.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, &body)
    }

    /// Maps a transport-level reqwest failure.
    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::new(ApiErrorKind::Network, "Request timed out")
        } else if error.is_connect() {
            Self::new(
                ApiErrorKind::Network,
                format!("Could not reach server: {error}"),
            )
        } else if error.is_decode() {
            Self::new(
                ApiErrorKind::Parse,
                format!("Failed to parse response: {error}"),
            )
        } else {
            Self::new(ApiErrorKind::Network, format!("Network error: {error}"))
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    pub fn storage(error: &anyhow::Error) -> Self {
        Self::new(ApiErrorKind::Storage, format!("Session storage error: {error:#}"))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message)
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.details = Some(match self.details.take() {
            Some(existing) => format!("{existing}\n{details}"),
            None => details,
        });
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }

    /// Server-supplied message, or `fallback` for generic HTTP failures.
    ///
    /// Local failures (network, storage, parse) keep their own message.
    pub fn user_message(&self, fallback: &str) -> String {
        match (&self.server_message, self.kind) {
            (Some(msg), _) => msg.clone(),
            (None, ApiErrorKind::Network | ApiErrorKind::Storage | ApiErrorKind::Parse) => {
                self.message.clone()
            }
            (None, _) => fallback.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Pulls a readable message out of a JSON error body.
///
/// A single `detail`/`error`/`message` string wins; otherwise an object
/// of field errors is flattened to `field: a, b | other: c`.
fn extract_server_message(json: &Value) -> Option<String> {
    let obj = json.as_object()?;

    for key in ["detail", "error", "message"] {
        if let Some(msg) = obj.get(key).and_then(Value::as_str) {
            return Some(msg.to_string());
        }
    }

    let parts: Vec<String> = obj
        .iter()
        .map(|(field, value)| format!("{field}: {}", flatten_field_value(value)))
        .collect();

    (!parts.is_empty()).then(|| parts.join(" | "))
}

fn flatten_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_field_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => extract_server_message(value).unwrap_or_default(),
        other => other.to_string(),
    }
}
