//! Raw and decoded HTTP responses

use crate::error::{RequestError, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Status, headers and body of one HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Build a JSON response (mostly useful when scripting responses in tests)
    pub fn from_json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, body.to_string().into_bytes())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as a JSON value, `None` when empty or not JSON
    pub fn json_value(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Body as a JSON value, `None` when empty; a malformed body is [`crate::Error::Decode`]
    pub fn json_body(&self) -> Result<Option<Value>> {
        if self.body.is_empty() {
            return Ok(None);
        }
        self.json().map(Some)
    }

    /// Turn a non-success status into [`crate::Error::Request`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RequestError::from_response(self).into())
        }
    }
}

/// A decoded value together with the response it was decoded from
#[derive(Debug, Clone)]
pub struct Response<T> {
    value: T,
    raw: RawResponse,
}

impl<T> Response<T> {
    pub fn new(value: T, raw: RawResponse) -> Self {
        Self { value, raw }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn raw_response(&self) -> &RawResponse {
        &self.raw
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            value: f(self.value),
            raw: self.raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_for_status_keeps_success() {
        let raw = RawResponse::from_json(200, &json!({"name": "a"}));
        let raw = raw.error_for_status().unwrap();
        assert_eq!(raw.header("content-type"), Some("application/json"));
        assert_eq!(raw.json_value().unwrap()["name"], "a");
    }

    #[test]
    fn test_error_for_status_classifies_failure() {
        let raw = RawResponse::from_json(404, &json!({"error": {"code": "NotFound"}}));
        let err = raw.error_for_status().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_body_has_no_json_value() {
        let raw = RawResponse::new(204, HeaderMap::new(), Vec::new());
        assert!(raw.json_value().is_none());
        assert!(raw.json_body().unwrap().is_none());
        assert!(raw.is_success());
    }

    #[test]
    fn test_json_body_rejects_malformed() {
        let raw = RawResponse::new(200, HeaderMap::new(), b"<html>gateway</html>".to_vec());
        assert!(matches!(raw.json_body(), Err(crate::Error::Decode(_))));
    }
}
