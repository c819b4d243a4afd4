//! Credentials
//!
//! The pipeline only needs a bearer token; where it comes from is behind the
//! [`TokenCredential`] trait. [`CachedCredential`] adds expiry-aware caching
//! in front of any provider.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Environment variable read by [`EnvironmentCredential`]
pub const ACCESS_TOKEN_ENV: &str = "ARMKIT_ACCESS_TOKEN";

/// Environment variable holding the default subscription
pub const SUBSCRIPTION_ENV: &str = "ARMKIT_SUBSCRIPTION_ID";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the provider gives no expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Bearer token plus optional expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }
}

// Security: never print the token itself
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for the pipeline
pub trait TokenCredential: Send + Sync {
    fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> BoxFuture<'a, Result<AccessToken>>;
}

/// Fixed token, mostly for tests and short-lived scripts
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenCredential for StaticTokenCredential {
    fn get_token<'a>(&'a self, _scopes: &'a [&'a str]) -> BoxFuture<'a, Result<AccessToken>> {
        let token = AccessToken::new(self.token.clone());
        async move { Ok(token) }.boxed()
    }
}

/// Token read from [`ACCESS_TOKEN_ENV`] at request time
#[derive(Clone, Default)]
pub struct EnvironmentCredential;

impl TokenCredential for EnvironmentCredential {
    fn get_token<'a>(&'a self, _scopes: &'a [&'a str]) -> BoxFuture<'a, Result<AccessToken>> {
        async move {
            match std::env::var(ACCESS_TOKEN_ENV) {
                Ok(token) if !token.trim().is_empty() => Ok(AccessToken::new(token.trim())),
                _ => Err(Error::credential(format!(
                    "No access token found. Set {ACCESS_TOKEN_ENV}"
                ))),
            }
        }
        .boxed()
    }
}

#[derive(Clone)]
struct CachedToken {
    token: AccessToken,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Credential wrapper with token caching
#[derive(Clone)]
pub struct CachedCredential {
    provider: Arc<dyn TokenCredential>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl CachedCredential {
    pub fn new(provider: Arc<dyn TokenCredential>) -> Self {
        Self {
            provider,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token, from cache while it is still valid
    /// Security: Checks token expiry before returning cached token
    pub async fn token(&self, scopes: &[&str]) -> Result<AccessToken> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self.provider.get_token(scopes).await?;

        let expires_at = token
            .expires_at
            .unwrap_or_else(|| Instant::now() + DEFAULT_TOKEN_TTL)
            .checked_sub(TOKEN_EXPIRY_BUFFER)
            .unwrap_or_else(Instant::now);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            expires_at.saturating_duration_since(Instant::now()).as_secs() / 60
        );

        Ok(token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.token(scopes).await
    }
}

impl TokenCredential for CachedCredential {
    fn get_token<'a>(&'a self, scopes: &'a [&'a str]) -> BoxFuture<'a, Result<AccessToken>> {
        self.token(scopes).boxed()
    }
}

/// Subscription ids are GUIDs
fn validate_subscription_id(subscription: &str) -> bool {
    uuid::Uuid::parse_str(subscription).is_ok()
}

/// Read the default subscription from the environment
/// Security: Validates the id format before returning
pub fn get_default_subscription() -> Option<String> {
    let subscription = std::env::var(SUBSCRIPTION_ENV).ok()?;
    let subscription = subscription.trim();
    if validate_subscription_id(subscription) {
        return Some(subscription.to_string());
    }
    tracing::warn!("Invalid subscription id format in {}", SUBSCRIPTION_ENV);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCredential {
        calls: AtomicUsize,
        ttl: Option<Duration>,
    }

    impl TokenCredential for CountingCredential {
        fn get_token<'a>(&'a self, _scopes: &'a [&'a str]) -> BoxFuture<'a, Result<AccessToken>> {
            async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(AccessToken {
                    token: format!("token-{n}"),
                    expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_cached_credential_reuses_token() {
        let provider = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
            ttl: None,
        });
        let cached = CachedCredential::new(provider.clone());

        let first = cached.token(&["scope"]).await.unwrap();
        let second = cached.token(&["scope"]).await.unwrap();

        assert_eq!(first.token, "token-0");
        assert_eq!(second.token, "token-0");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_credential_refetches_expiring_token() {
        // Expires inside the buffer, so it is never considered valid
        let provider = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
            ttl: Some(Duration::from_secs(10)),
        });
        let cached = CachedCredential::new(provider.clone());

        cached.token(&["scope"]).await.unwrap();
        let second = cached.token(&["scope"]).await.unwrap();

        assert_eq!(second.token, "token-1");
    }

    #[tokio::test]
    async fn test_refresh_token_clears_cache() {
        let provider = Arc::new(CountingCredential {
            calls: AtomicUsize::new(0),
            ttl: None,
        });
        let cached = CachedCredential::new(provider.clone());

        cached.token(&["scope"]).await.unwrap();
        let refreshed = cached.refresh_token(&["scope"]).await.unwrap();

        assert_eq!(refreshed.token, "token-1");
    }

    #[tokio::test]
    async fn test_static_credential() {
        let credential = StaticTokenCredential::new("abc");
        let token = credential.get_token(&[]).await.unwrap();
        assert_eq!(token.token, "abc");
        assert!(!format!("{token:?}").contains("abc"));
    }

    #[test]
    fn test_validate_subscription_id() {
        assert!(validate_subscription_id("00000000-0000-0000-0000-000000000000"));
        assert!(!validate_subscription_id("my-subscription"));
        assert!(!validate_subscription_id(""));
    }
}
