//! Management client
//!
//! Main client for the resource-management REST API, combining the HTTP
//! pipeline with endpoint and API-version handling.

use super::auth::{CachedCredential, TokenCredential};
use super::http::HttpPipeline;
use super::response::RawResponse;
use crate::error::{Error, Result};
use crate::lro::PollingPolicy;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default management endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// API versions of the resource-management service known to this client
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceVersion {
    V2021_04_01,
    V2022_09_01,
    #[default]
    V2024_03_01,
}

impl ServiceVersion {
    pub const LATEST: Self = Self::V2024_03_01;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2021_04_01 => "2021-04-01",
            Self::V2022_09_01 => "2022-09-01",
            Self::V2024_03_01 => "2024-03-01",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2021-04-01" => Some(Self::V2021_04_01),
            "2022-09-01" => Some(Self::V2022_09_01),
            "2024-03-01" => Some(Self::V2024_03_01),
            _ => None,
        }
    }
}

/// Client construction options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API version used when a call does not name its own
    pub api_version: String,
    /// Per-request timeout enforced by the transport
    pub timeout: Option<Duration>,
    /// Polling policy for operations waited on by collections
    pub polling: PollingPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_version: ServiceVersion::LATEST.as_str().to_string(),
            timeout: Some(Duration::from_secs(60)),
            polling: PollingPolicy::default(),
        }
    }
}

/// Main management client
#[derive(Clone)]
pub struct ArmClient {
    pub http: HttpPipeline,
    endpoint: Url,
    options: ClientOptions,
}

impl ArmClient {
    /// Create a new client; tokens from `credential` are cached
    pub fn new(endpoint: &str, credential: Arc<dyn TokenCredential>, options: ClientOptions) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidArgument(format!("endpoint '{endpoint}': {e}")))?;
        let scope = format!("{}/.default", endpoint.as_str().trim_end_matches('/'));

        let credential: Arc<dyn TokenCredential> = Arc::new(CachedCredential::new(credential));
        let http = HttpPipeline::new(credential, vec![scope], options.timeout)?;

        Ok(Self {
            http,
            endpoint,
            options,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Build a request URL
    ///
    /// Absolute URLs are used as they are. Paths are joined to the endpoint and
    /// get an `api-version` query parameter unless they already carry one.
    pub fn url_for(&self, path: &str, api_version: Option<&str>) -> Result<String> {
        if path.starts_with("https://") || path.starts_with("http://") {
            return Ok(path.to_string());
        }

        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| Error::InvalidArgument(format!("path '{path}': {e}")))?;

        if !url.query_pairs().any(|(k, _)| k == "api-version") {
            let version = api_version.unwrap_or(&self.options.api_version);
            url.query_pairs_mut().append_pair("api-version", version);
        }

        Ok(url.into())
    }

    /// GET a resource path
    pub async fn get(&self, path: &str, api_version: Option<&str>) -> Result<RawResponse> {
        let url = self.url_for(path, api_version)?;
        self.http.send(Method::GET, &url, None).await
    }

    /// GET an absolute URL handed out by the service (next links, operation locations)
    pub async fn get_url(&self, url: &str) -> Result<RawResponse> {
        self.http.send(Method::GET, url, None).await
    }

    /// PUT a JSON body to a resource path
    pub async fn put(&self, path: &str, api_version: Option<&str>, body: &Value) -> Result<RawResponse> {
        let url = self.url_for(path, api_version)?;
        self.http.send(Method::PUT, &url, Some(body)).await
    }

    /// DELETE a resource path
    pub async fn delete(&self, path: &str, api_version: Option<&str>) -> Result<RawResponse> {
        let url = self.url_for(path, api_version)?;
        self.http.send(Method::DELETE, &url, None).await
    }
}
