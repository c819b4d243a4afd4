//! Configuration Management
//!
//! Handles persistent configuration storage for armkit.

use anyhow::{Context, Result};
use anyhow::bail;
use armkit::arm::auth::{get_default_subscription, SUBSCRIPTION_ENV};
use armkit::arm::client::{ClientOptions, ServiceVersion, DEFAULT_ENDPOINT};
use armkit::PollingPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the management endpoint
pub const ENDPOINT_ENV: &str = "ARMKIT_ENDPOINT";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Management endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Default API version
    #[serde(default)]
    pub api_version: Option<String>,
    /// Fixed polling interval; exponential backoff when unset
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    /// Per-request timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Last listed resource type
    #[serde(default)]
    pub last_resource: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("armkit").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective endpoint (CLI > config > environment > default)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> String {
        cli.map(String::from)
            .or_else(|| self.endpoint.clone())
            .or_else(|| std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Get effective API version (CLI > config > latest known)
    pub fn effective_api_version(&self, cli: Option<&str>) -> String {
        let version = cli
            .map(String::from)
            .or_else(|| self.api_version.clone())
            .unwrap_or_else(|| ServiceVersion::LATEST.as_str().to_string());

        if ServiceVersion::parse(&version).is_none() {
            tracing::warn!("API version {} is not known to this client", version);
        }
        version
    }

    /// Build client options from this configuration
    pub fn to_client_options(&self, api_version: Option<&str>) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            api_version: self.effective_api_version(api_version),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .or(defaults.timeout),
            polling: self
                .poll_interval_ms
                .map(|ms| PollingPolicy::Fixed(Duration::from_millis(ms)))
                .unwrap_or(defaults.polling),
        }
    }

    /// Set last listed resource type and save
    pub fn set_last_resource(&mut self, key: &str) -> Result<()> {
        self.last_resource = Some(key.to_string());
        self.save()
    }
}

/// Resolve `--scope` against the default subscription from the environment
pub fn effective_scope(cli: Option<&str>) -> Result<String> {
    resolve_scope(cli, get_default_subscription())
}

/// Full ids pass through; anything else is placed under `subscription`
fn resolve_scope(scope: Option<&str>, subscription: Option<String>) -> Result<String> {
    let scope = scope.map(str::trim).unwrap_or_default().trim_end_matches('/');
    if scope.to_ascii_lowercase().starts_with("/subscriptions/") {
        return Ok(scope.to_string());
    }

    let Some(subscription) = subscription else {
        bail!("--scope has no subscription and {} is not set", SUBSCRIPTION_ENV);
    };

    if scope.is_empty() {
        Ok(format!("/subscriptions/{subscription}"))
    } else if scope.starts_with('/') {
        Ok(format!("/subscriptions/{subscription}{scope}"))
    } else {
        Ok(format!("/subscriptions/{subscription}/{scope}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_endpoint_wins() {
        let config = Config {
            endpoint: Some("https://config.example".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.effective_endpoint(Some("https://cli.example")),
            "https://cli.example"
        );
        assert_eq!(config.effective_endpoint(None), "https://config.example");
    }

    #[test]
    fn test_client_options_from_config() {
        let config = Config {
            api_version: Some("2022-09-01".to_string()),
            poll_interval_ms: Some(250),
            timeout_secs: Some(5),
            ..Default::default()
        };
        let options = config.to_client_options(None);
        assert_eq!(options.api_version, "2022-09-01");
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.polling, PollingPolicy::Fixed(Duration::from_millis(250)));
    }

    #[test]
    fn test_defaults() {
        let options = Config::default().to_client_options(None);
        assert_eq!(options.api_version, ServiceVersion::LATEST.as_str());
        assert_eq!(options.polling, PollingPolicy::default());
    }

    const SUB: &str = "00000000-0000-0000-0000-000000000001";

    #[test]
    fn test_full_scope_is_kept() {
        let scope = resolve_scope(Some("/subscriptions/s/resourceGroups/g/"), None).unwrap();
        assert_eq!(scope, "/subscriptions/s/resourceGroups/g");
    }

    #[test]
    fn test_missing_scope_uses_default_subscription() {
        let scope = resolve_scope(None, Some(SUB.to_string())).unwrap();
        assert_eq!(scope, format!("/subscriptions/{SUB}"));
    }

    #[test]
    fn test_group_scope_is_placed_under_subscription() {
        let expected = format!("/subscriptions/{SUB}/resourceGroups/g");
        assert_eq!(
            resolve_scope(Some("/resourceGroups/g"), Some(SUB.to_string())).unwrap(),
            expected
        );
        assert_eq!(
            resolve_scope(Some("resourceGroups/g"), Some(SUB.to_string())).unwrap(),
            expected
        );
    }

    #[test]
    fn test_scope_without_subscription_fails() {
        let err = resolve_scope(Some("/resourceGroups/g"), None).unwrap_err();
        assert!(err.to_string().contains(SUBSCRIPTION_ENV));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"last_resource":"dns-zones"}"#).unwrap();
        assert_eq!(config.last_resource.as_deref(), Some("dns-zones"));
        assert!(config.endpoint.is_none());
    }
}
