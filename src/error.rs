use std::path::PathBuf;
use thiserror::Error;

use crate::stats::FailureKind;

/// Failure of a single HTTP exchange with the annotate endpoint.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// DNS, TLS or connection-level failure.
    #[error("Cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// The endpoint answered with a non-success status.
    #[error("Endpoint returned HTTP {status}")]
    Status {
        status: u16,
        /// Response body, when it was valid JSON.
        body: Option<serde_json::Value>,
    },

    /// A 2xx response whose body was not valid JSON.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Any other request failure reported by the HTTP client.
    ///
    /// `retryable` is set for failures while sending the request or reading
    /// the body (connection reset, truncated body).
    #[error("Request failed: {message}")]
    Request { message: String, retryable: bool },

    /// The configured endpoint is not a valid URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
}

impl TransportError {
    /// HTTP status code, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `error` object of an HTTP error response, if the API sent one.
    pub fn api_error_body(&self) -> Option<&serde_json::Value> {
        match self {
            TransportError::Status { body: Some(body), .. } => {
                body.get("error").filter(|e| !is_empty_value(e))
            }
            _ => None,
        }
    }

    /// The API's `error` object when the response is a rejection of the
    /// request itself: a 4xx other than 408 that carries an error body.
    ///
    /// 408 and 5xx are service-side failures whatever the body says.
    pub fn api_rejection(&self) -> Option<&serde_json::Value> {
        match self.status() {
            Some(status) if is_service_failure(status) => None,
            Some(status) if (400..500).contains(&status) => self.api_error_body(),
            _ => None,
        }
    }

    /// Whether another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout { .. } | TransportError::Connect { .. } => true,
            TransportError::Status { status, .. } => {
                is_service_failure(*status)
                    || (*status == 429 && self.api_error_body().is_none())
            }
            TransportError::Request { retryable, .. } => *retryable,
            TransportError::MalformedResponse(_) | TransportError::InvalidEndpoint(_) => false,
        }
    }
}

fn is_service_failure(status: u16) -> bool {
    status == 408 || status >= 500
}

/// Errors returned by the typed `try_*` detection API.
///
/// The `Option`-returning API collapses all of these into `None`.
#[derive(Error, Debug)]
pub enum VisionError {
    /// No API key is configured. No request was attempted.
    #[error("Google Vision API key is not configured")]
    ConfigurationMissing,

    #[error("Failed to read image {}: {source}", .path.display())]
    ImageRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API reported an error object (invalid key, quota, bad image...).
    #[error("Google Vision API error: {message}")]
    Api {
        code: Option<i64>,
        message: String,
        status: Option<u16>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl VisionError {
    /// Build an [`VisionError::Api`] from the API's `error` value.
    pub(crate) fn from_api_error(error: &serde_json::Value, status: Option<u16>) -> Self {
        let code = error.get("code").and_then(|c| c.as_i64());
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| error.as_str().map(str::to_string))
            .unwrap_or_else(|| error.to_string());
        VisionError::Api {
            code,
            message,
            status,
        }
    }

    /// Failure category recorded on the observability side-channel.
    pub fn kind(&self) -> FailureKind {
        match self {
            VisionError::ConfigurationMissing => FailureKind::ConfigurationMissing,
            VisionError::ImageRead { .. } => FailureKind::ImageUnreadable,
            VisionError::Transport(_) | VisionError::Json(_) => FailureKind::TransportFailure,
            VisionError::Api { .. } => FailureKind::ApiError,
            VisionError::Settings(_) => FailureKind::ConfigurationMissing,
        }
    }
}

/// Mirrors the loose "empty" check the API contract relies on: `null`,
/// `false`, `""`, `0`, `[]` and `{}` all count as no error.
pub(crate) fn is_empty_value(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VisionError>;
