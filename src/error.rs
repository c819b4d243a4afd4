//! Error taxonomy for armkit
//!
//! Every fallible library call returns [`Result`]. The variants keep the
//! different failure kinds apart: a request that never completed
//! ([`Error::Transport`]), a request the service rejected ([`Error::Request`]),
//! a long-running operation whose remote work failed ([`Error::OperationFailed`])
//! and a wait loop the caller aborted ([`Error::Cancelled`]).

use crate::arm::response::RawResponse;
use crate::lro::{OperationError, OperationStatus};
use std::fmt;

/// Result alias used across the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed source error for transport and credential failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be completed (connect failure, timeout, broken body)
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The service answered with a non-success status code
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The long-running operation finished but the remote work did not succeed
    #[error("operation {id} finished with status {status}{}", fmt_operation_error(.error))]
    OperationFailed {
        id: String,
        status: OperationStatus,
        error: Option<OperationError>,
    },

    /// The caller cancelled a wait loop
    #[error("operation wait was cancelled")]
    Cancelled,

    /// A value was requested from an operation that has not reached a terminal state
    #[error("operation {id} has not completed (status {status})")]
    OperationNotComplete { id: String, status: OperationStatus },

    /// An initiating response carried no operation location header
    #[error("response with status {status} has no operation location header")]
    MissingOperationLocation { status: u16 },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid resource id '{id}': {reason}")]
    InvalidResourceId { id: String, reason: String },

    #[error("credential error: {message}")]
    Credential {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    /// Build a transport error from any underlying error
    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status of the failing response, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => Some(e.status),
            _ => None,
        }
    }

    /// True when the service answered 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "failed to connect".to_string()
        } else {
            "failed to send request".to_string()
        };
        Self::transport(message, err)
    }
}

fn fmt_operation_error(error: &Option<OperationError>) -> String {
    match error {
        Some(e) => format!(": {e}"),
        None => String::new(),
    }
}

/// A non-success response from the service
///
/// Keeps the raw response so callers can inspect headers and the full body.
#[derive(Debug, Clone)]
pub struct RequestError {
    pub status: u16,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub raw: RawResponse,
}

impl RequestError {
    /// Classify a raw response, parsing `{"error": {"code", "message"}}` if present
    pub fn from_response(raw: RawResponse) -> Self {
        let (error_code, message) = match raw.json_value() {
            Some(body) => {
                let error = body.get("error").unwrap_or(&body);
                (
                    error.get("code").and_then(|v| v.as_str()).map(String::from),
                    error.get("message").and_then(|v| v.as_str()).map(String::from),
                )
            }
            None => (None, None),
        };

        Self {
            status: raw.status(),
            error_code,
            message,
            raw,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed with status {}", self.status)?;
        if let Some(code) = &self.error_code {
            write!(f, " ({code})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestError {}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    #[test]
    fn test_request_error_parses_service_error() {
        let raw = RawResponse::new(
            409,
            HeaderMap::new(),
            br#"{"error":{"code":"Conflict","message":"zone exists"}}"#.to_vec(),
        );
        let err = RequestError::from_response(raw);
        assert_eq!(err.status, 409);
        assert_eq!(err.error_code.as_deref(), Some("Conflict"));
        assert_eq!(err.message.as_deref(), Some("zone exists"));
        assert_eq!(
            err.to_string(),
            "request failed with status 409 (Conflict): zone exists"
        );
    }

    #[test]
    fn test_request_error_without_body() {
        let raw = RawResponse::new(503, HeaderMap::new(), Vec::new());
        let err = Error::from(RequestError::from_response(raw));
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "request failed with status 503");
    }

    #[test]
    fn test_operation_failed_display() {
        let err = Error::OperationFailed {
            id: "op-1".to_string(),
            status: OperationStatus::Failed,
            error: Some(OperationError {
                code: Some("QuotaExceeded".to_string()),
                message: Some("no capacity".to_string()),
            }),
        };
        assert_eq!(
            err.to_string(),
            "operation op-1 finished with status Failed: QuotaExceeded: no capacity"
        );
    }
}
