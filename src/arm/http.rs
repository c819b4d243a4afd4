//! HTTP pipeline for management REST calls
//!
//! Sends one request, attaches auth and request-id headers, and hands back a
//! [`RawResponse`]. Status codes are not judged here; callers classify them
//! with [`RawResponse::error_for_status`]. Retries of transient failures are
//! not this layer's business either.

use super::auth::TokenCredential;
use super::response::RawResponse;
use crate::error::{Error, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the client-generated request id
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP pipeline: reqwest client plus credential
#[derive(Clone)]
pub struct HttpPipeline {
    client: Client,
    credential: Arc<dyn TokenCredential>,
    scopes: Vec<String>,
}

impl HttpPipeline {
    /// Create a new pipeline
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        scopes: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("armkit/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::transport("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            credential,
            scopes,
        })
    }

    /// Send one request and collect the whole response
    pub async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<RawResponse> {
        tracing::debug!("{} {}", method, url);

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let token = self.credential.get_token(&scopes).await?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&token.token)
            .header(CLIENT_REQUEST_ID_HEADER, &request_id);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let raw = RawResponse::new(status, headers, body);

        if raw.is_success() {
            tracing::debug!("{} <- {}", request_id, status);
        } else {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&raw.text()));
        }

        Ok(raw)
    }
}

/// Format an armkit error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_error(error: &Error) -> String {
    match error {
        Error::Request(e) => match e.status {
            401 => "Authentication failed. Check your access token.".to_string(),
            403 => "Permission denied. Check your role assignments.".to_string(),
            404 => "Resource not found.".to_string(),
            409 => "Resource conflict. The resource may already exist or be in use.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            400 => "Invalid request. Check your parameters.".to_string(),
            500..=599 => "Service temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        },
        Error::Transport { .. } => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        Error::Cancelled => "Cancelled.".to_string(),
        other => {
            // Truncate long error messages and remove potential sensitive data
            let error_str = other.to_string();
            let sanitized = error_str
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect::<String>();

            if sanitized.len() < error_str.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use reqwest::header::HeaderMap;

    fn request_error(status: u16) -> Error {
        RequestError::from_response(RawResponse::new(status, HeaderMap::new(), Vec::new())).into()
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(200)));
        assert!(sanitized.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = format!("{}é{}", "x".repeat(199), "y".repeat(50));
        // Must not panic on the two-byte character at the cut
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_format_error_by_status() {
        assert_eq!(format_error(&request_error(404)), "Resource not found.");
        assert!(format_error(&request_error(403)).contains("Permission denied"));
        assert!(format_error(&request_error(503)).contains("temporarily unavailable"));
        assert!(format_error(&request_error(418)).contains("Request failed"));
    }

    #[test]
    fn test_format_error_truncates_other_errors() {
        let err = Error::InvalidArgument("n".repeat(200));
        let formatted = format_error(&err);
        assert!(formatted.ends_with("..."));
        assert_eq!(formatted.len(), 83);
    }
}
