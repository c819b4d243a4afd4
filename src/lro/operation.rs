//! Operation handle

use super::{OperationError, OperationLocation, OperationStatus, PollResponse, PollingPolicy};
use crate::arm::response::RawResponse;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Status-check function: one request against the operation location
pub type PollFn<T> =
    Arc<dyn Fn(OperationLocation) -> BoxFuture<'static, Result<PollResponse<T>>> + Send + Sync>;

/// Client-side handle for a long-running operation
///
/// Owns its status exclusively. Once the status is terminal the handle never
/// touches the network again.
pub struct Operation<T> {
    id: String,
    location: Option<OperationLocation>,
    poll: Option<PollFn<T>>,
    status: OperationStatus,
    value: Option<T>,
    error: Option<OperationError>,
    raw: RawResponse,
    retry_after: Option<Duration>,
    poll_count: u32,
}

impl<T> fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("status", &self.status)
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("poll_count", &self.poll_count)
            .finish()
    }
}

impl<T: Send + 'static> Operation<T> {
    /// Build a handle from the initiating response
    ///
    /// The response must be a 2xx/3xx carrying an operation location header.
    /// `202 Accepted` starts the handle as `NotStarted`, anything else as `Running`.
    pub fn start<F, Fut>(initial: RawResponse, poll: F) -> Result<Self>
    where
        F: Fn(OperationLocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollResponse<T>>> + Send + 'static,
    {
        if !(200..400).contains(&initial.status()) {
            return Err(crate::error::RequestError::from_response(initial).into());
        }

        let Some(location) = OperationLocation::from_response(&initial) else {
            return Err(Error::MissingOperationLocation {
                status: initial.status(),
            });
        };

        let status = if initial.status() == 202 {
            OperationStatus::NotStarted
        } else {
            OperationStatus::Running
        };

        let id = operation_id(&location);
        tracing::debug!("Operation {} started at {} ({})", id, location, status);

        let poll: PollFn<T> = Arc::new(move |location| poll(location).boxed());

        Ok(Self {
            id,
            retry_after: super::retry_after(&initial),
            location: Some(location),
            poll: Some(poll),
            status,
            value: None,
            error: None,
            raw: initial,
            poll_count: 0,
        })
    }
}

impl<T> Operation<T> {
    /// A handle for an initiating call that already completed synchronously
    pub fn from_value(value: T, raw: RawResponse) -> Self {
        let id = raw
            .header("x-ms-request-id")
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            id,
            location: None,
            poll: None,
            status: OperationStatus::Succeeded,
            value: Some(value),
            error: None,
            raw,
            retry_after: None,
            poll_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Option<&OperationLocation> {
        self.location.as_ref()
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn has_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Service-reported error of a failed or canceled operation
    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    /// Last response seen: the initiating one, then each poll's
    pub fn raw_response(&self) -> &RawResponse {
        &self.raw
    }

    /// Last retry-after hint from the service
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Number of status-check requests issued so far
    pub fn poll_count(&self) -> u32 {
        self.poll_count
    }

    /// Result of a succeeded operation
    pub fn value(&self) -> Result<&T> {
        match (self.status, self.value.as_ref()) {
            (OperationStatus::Succeeded, Some(value)) => Ok(value),
            (OperationStatus::Failed | OperationStatus::Canceled, _) => Err(self.failure()),
            _ => Err(self.not_complete()),
        }
    }

    pub fn into_value(self) -> Result<T> {
        let Self {
            id,
            status,
            value,
            error,
            ..
        } = self;

        match (status, value) {
            (OperationStatus::Succeeded, Some(value)) => Ok(value),
            (OperationStatus::Failed | OperationStatus::Canceled, _) => {
                Err(Error::OperationFailed { id, status, error })
            }
            _ => Err(Error::OperationNotComplete { id, status }),
        }
    }

    fn failure(&self) -> Error {
        Error::OperationFailed {
            id: self.id.clone(),
            status: self.status,
            error: self.error.clone(),
        }
    }

    fn not_complete(&self) -> Error {
        Error::OperationNotComplete {
            id: self.id.clone(),
            status: self.status,
        }
    }

    /// Issue one status check and update the handle
    ///
    /// No-op returning the current status once terminal. A failed request
    /// leaves the handle untouched and returns the error.
    pub async fn poll_once(&mut self) -> Result<OperationStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }
        let (Some(poll), Some(location)) = (self.poll.as_ref(), self.location.as_ref()) else {
            return Ok(self.status);
        };

        let fut = poll(location.clone());
        self.poll_count += 1;
        let response = fut.await?;
        self.apply(response);

        Ok(self.status)
    }

    fn apply(&mut self, response: PollResponse<T>) {
        let (status, value, error, retry_after, raw) = response.into_parts();

        // Running never goes back to NotStarted
        let status = if status == OperationStatus::NotStarted {
            self.status
        } else {
            status
        };

        if status != self.status {
            tracing::info!("Operation {}: {} -> {}", self.id, self.status, status);
        }

        self.status = status;
        self.retry_after = retry_after;
        if let Some(raw) = raw {
            self.raw = raw;
        }

        match status {
            OperationStatus::Succeeded => self.value = value,
            OperationStatus::Failed | OperationStatus::Canceled => {
                if let Some(ref e) = error {
                    tracing::warn!("Operation {} {}: {}", self.id, status, e);
                }
                self.error = error;
            }
            _ => {}
        }
    }

    /// Poll until the operation reaches a terminal status
    ///
    /// Waits between polls for the service's retry-after hint, or the policy's
    /// backoff without one. `cancel` is checked before every poll and while
    /// waiting; it only stops this loop, never the remote operation. A failed
    /// remote operation is not an error here: check [`Operation::status`].
    pub async fn wait_until_complete(
        &mut self,
        policy: &PollingPolicy,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        let mut attempt = 0u32;

        while !self.status.is_terminal() {
            if cancel.is_cancelled() {
                tracing::debug!("Operation {} wait cancelled", self.id);
                return Err(Error::Cancelled);
            }

            self.poll_once().await?;
            if self.status.is_terminal() {
                break;
            }

            let delay = policy.next_delay(attempt, self.retry_after);
            attempt = attempt.saturating_add(1);
            tracing::debug!("Operation {} still {}, next poll in {:?}", self.id, self.status, delay);

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Operation {} wait cancelled", self.id);
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(self)
    }

    /// Wait for completion and hand back the result value
    pub async fn wait_for_completion(
        mut self,
        policy: &PollingPolicy,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.wait_until_complete(policy, cancel).await?;
        self.into_value()
    }
}

/// Short display id: last path segment of the location, query stripped
fn operation_id(location: &OperationLocation) -> String {
    let path = location.as_str().split('?').next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(location.as_str())
        .to_string()
}
