// ============================================================================
// Access Token Cache
// ============================================================================
//
// Client-credentials tokens for the mail provider. One TokenCache is shared
// by the mail client, the workbook sink and the subscription manager, so a
// batch of notifications costs at most one identity provider round trip.
//
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mailhook_config::GraphConfig;
use mailhook_error::{AppError, AppResult};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metrics;
use crate::utils::redact_body;

const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;

/// Bearer token with its absolute expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Source of fresh access tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> AppResult<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant against the identity provider
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    authority_base: String,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: String,
}

impl ClientCredentialsProvider {
    pub fn new(http: reqwest::Client, config: &GraphConfig) -> Self {
        Self {
            http,
            authority_base: config.authority_base.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn fetch_token(&self) -> AppResult<AccessToken> {
        let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            self.tenant_id.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
        ) else {
            return Err(AppError::config(
                "TENANT_ID, CLIENT_ID and CLIENT_SECRET are required to call the mail provider",
            ));
        };

        let token_url = format!("{}/{}/oauth2/v2.0/token", self.authority_base, tenant_id);

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", self.scope.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::auth(format!(
                "token request failed: status={} body={}",
                status,
                redact_body(&body)
            )));
        }

        let payload: OAuthTokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::auth(format!("token response is not valid JSON: {}", e)))?;

        Ok(AccessToken {
            value: payload.access_token,
            expires_at: Utc::now() + Duration::seconds(payload.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64),
        })
    }
}

/// Caches one access token and refreshes it shortly before expiry
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    skew: Duration,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, skew_secs: i64) -> Self {
        Self {
            provider,
            skew: Duration::seconds(skew_secs.max(0)),
            cached: RwLock::new(None),
        }
    }

    /// Return a valid bearer token, fetching a new one if needed
    pub async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = self.usable(&cached) {
                return Ok(token);
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = self.usable(&cached) {
            return Ok(token);
        }

        let token = self.provider.fetch_token().await?;
        metrics::TOKEN_REFRESHES_TOTAL.inc();
        tracing::debug!(expires_at = %token.expires_at, "Access token refreshed");

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token (after the provider rejected it)
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    fn usable(&self, cached: &Option<AccessToken>) -> Option<String> {
        cached
            .as_ref()
            .filter(|token| token.expires_at - self.skew > Utc::now())
            .map(|token| token.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        lifetime_secs: i64,
    }

    impl CountingProvider {
        fn new(lifetime_secs: i64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                lifetime_secs,
            })
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self) -> AppResult<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken {
                value: format!("token-{}", n),
                expires_at: Utc::now() + Duration::seconds(self.lifetime_secs),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        async fn fetch_token(&self) -> AppResult<AccessToken> {
            Err(AppError::config("no credentials"))
        }
    }

    #[tokio::test]
    async fn test_token_is_reused_until_expiry() {
        let provider = CountingProvider::new(3600);
        let cache = TokenCache::new(provider.clone(), 60);

        assert_eq!(cache.access_token().await.unwrap(), "token-1");
        assert_eq!(cache.access_token().await.unwrap(), "token-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_inside_skew_window_is_refreshed() {
        // Lifetime shorter than the skew: every call needs a new token
        let provider = CountingProvider::new(30);
        let cache = TokenCache::new(provider.clone(), 60);

        assert_eq!(cache.access_token().await.unwrap(), "token-1");
        assert_eq!(cache.access_token().await.unwrap(), "token-2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let provider = CountingProvider::new(3600);
        let cache = TokenCache::new(provider.clone(), 60);

        cache.access_token().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.access_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let provider = CountingProvider::new(3600);
        let cache = Arc::new(TokenCache::new(provider.clone(), 60));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.access_token().await.unwrap() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "token-1");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let cache = TokenCache::new(Arc::new(FailingProvider), 60);
        let err = cache.access_token().await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let config = GraphConfig {
            tenant_id: None,
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            mailbox: None,
            api_base: "http://127.0.0.1:9".into(),
            authority_base: "http://127.0.0.1:9".into(),
            scope: "scope".into(),
            token_expiry_skew_secs: 60,
        };
        let provider = ClientCredentialsProvider::new(reqwest::Client::new(), &config);

        let err = provider.fetch_token().await.unwrap_err();
        assert!(err.is_config());
    }
}
