//! Long-running operations
//!
//! A long-running operation (LRO) is a server-side job started by one request
//! and tracked through a separate status endpoint, its *operation location*.
//! [`Operation`] is the client-side handle for such a job.
//!
//! # Module Structure
//!
//! - [`OperationStatus`] - the status state machine
//! - [`PollResponse`] - one classified answer from the status endpoint
//! - [`PollingPolicy`] - delay between polls when the service gives no hint
//! - [`Operation`] - the handle itself (see `operation.rs`)
//!
//! # Example
//!
//! ```ignore
//! use armkit::lro::{Operation, PollingPolicy, PollResponse};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut op = Operation::start(initial_response, move |location| {
//!     let client = client.clone();
//!     async move {
//!         let raw = client.get_url(location.as_str()).await?;
//!         PollResponse::from_raw(raw, armkit::lro::decode_result)
//!     }
//! })?;
//! op.wait_until_complete(&PollingPolicy::default(), &CancellationToken::new()).await?;
//! ```

mod operation;

pub use operation::{Operation, PollFn};

use crate::arm::response::RawResponse;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Headers that can carry the operation location, in priority order
pub const OPERATION_LOCATION_HEADERS: &[&str] =
    &["azure-asyncoperation", "operation-location", "location"];

/// Status of a long-running operation
///
/// `NotStarted -> Running -> {Succeeded, Failed, Canceled}`. The three last
/// variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    /// The service reports the remote job was canceled
    Canceled,
}

impl OperationStatus {
    /// Parse a status string as reported by the service (case-insensitive)
    ///
    /// Unknown values are treated as still running.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "notstarted" | "not_started" => Self::NotStarted,
            "succeeded" | "success" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            "running" | "inprogress" | "in_progress" | "accepted" | "creating" | "updating"
            | "deleting" | "provisioning" => Self::Running,
            other => {
                tracing::warn!("Unknown operation status '{}', treating as running", other);
                Self::Running
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the service for a failed operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => f.write_str(code),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unknown error"),
        }
    }
}

/// Opaque reference to an operation's status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationLocation(String);

impl OperationLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Find the operation location in a response's headers
    pub fn from_response(raw: &RawResponse) -> Option<Self> {
        OPERATION_LOCATION_HEADERS
            .iter()
            .find_map(|name| raw.header(name))
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller's choice when starting an operation through a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// Return as soon as the service accepted the request
    Started,
    /// Poll until the operation reaches a terminal status
    #[default]
    Completed,
}

/// Delay between polls when the service sent no retry-after hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingPolicy {
    Fixed(Duration),
    /// Doubles from `initial` on every attempt, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl PollingPolicy {
    /// Delay after the poll numbered `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(interval) => interval,
            Self::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }

    /// Server hint wins over the policy's own backoff
    pub fn next_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay(attempt))
    }
}

/// One classified answer from an operation's status endpoint
#[derive(Debug, Clone)]
pub struct PollResponse<T> {
    status: OperationStatus,
    value: Option<T>,
    error: Option<OperationError>,
    retry_after: Option<Duration>,
    raw: Option<RawResponse>,
}

impl<T> PollResponse<T> {
    fn with_status(status: OperationStatus) -> Self {
        Self {
            status,
            value: None,
            error: None,
            retry_after: None,
            raw: None,
        }
    }

    pub fn not_started() -> Self {
        Self::with_status(OperationStatus::NotStarted)
    }

    pub fn running() -> Self {
        Self::with_status(OperationStatus::Running)
    }

    pub fn succeeded(value: T) -> Self {
        Self {
            value: Some(value),
            ..Self::with_status(OperationStatus::Succeeded)
        }
    }

    pub fn failed(error: Option<OperationError>) -> Self {
        Self {
            error,
            ..Self::with_status(OperationStatus::Failed)
        }
    }

    pub fn canceled(error: Option<OperationError>) -> Self {
        Self {
            error,
            ..Self::with_status(OperationStatus::Canceled)
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: RawResponse) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Convert the result value, keeping status, error and hints
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollResponse<U> {
        PollResponse {
            status: self.status,
            value: self.value.map(f),
            error: self.error,
            retry_after: self.retry_after,
            raw: self.raw,
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        OperationStatus,
        Option<T>,
        Option<OperationError>,
        Option<Duration>,
        Option<RawResponse>,
    ) {
        (self.status, self.value, self.error, self.retry_after, self.raw)
    }

    /// Classify a raw status-endpoint response
    ///
    /// Non-success statuses become [`crate::Error::Request`] and a body that is
    /// not valid JSON becomes [`crate::Error::Decode`]. The operation status
    /// comes from the body's `status` (or `properties.provisioningState`);
    /// without one, `202` means running and any other success means done.
    /// `decode` is only called for a succeeded operation.
    pub fn from_raw(raw: RawResponse, decode: impl FnOnce(&Value) -> Result<T>) -> Result<Self> {
        let raw = raw.error_for_status()?;
        let body = raw.json_body()?.unwrap_or(Value::Null);
        let retry_after = retry_after(&raw);

        let status = status_from_body(&body).unwrap_or(if raw.status() == 202 {
            OperationStatus::Running
        } else {
            OperationStatus::Succeeded
        });

        let response = match status {
            OperationStatus::Succeeded => Self::succeeded(decode(&body)?),
            OperationStatus::Failed => Self::failed(error_from_body(&body)),
            OperationStatus::Canceled => Self::canceled(error_from_body(&body)),
            other => Self::with_status(other),
        };

        Ok(response.with_retry_after(retry_after).with_raw(raw))
    }
}

/// Decode an operation result: the `result` field when present, else the whole body
pub fn decode_result<T: DeserializeOwned>(body: &Value) -> Result<T> {
    let value = body.get("result").unwrap_or(body);
    Ok(T::deserialize(value)?)
}

fn status_from_body(body: &Value) -> Option<OperationStatus> {
    body.get("status")
        .or_else(|| body.get("properties").and_then(|p| p.get("provisioningState")))
        .and_then(|v| v.as_str())
        .map(OperationStatus::parse)
}

fn error_from_body(body: &Value) -> Option<OperationError> {
    body.get("error")
        .and_then(|e| serde_json::from_value(e.clone()).ok())
}

/// Parse the server's polling hint
///
/// Millisecond headers take precedence over `Retry-After`, which may be
/// delta-seconds or an HTTP-date.
pub fn retry_after(raw: &RawResponse) -> Option<Duration> {
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = raw.header(name).and_then(|v| v.trim().parse::<u64>().ok()) {
            return Some(Duration::from_millis(ms));
        }
    }

    let value = raw.header("retry-after")?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
