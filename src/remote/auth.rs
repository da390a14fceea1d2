//! Bearer token provider.
//!
//! Tokens come from the identity provider's token endpoint and are cached for
//! a fixed window (5 minutes by default, shorter if the provider says the
//! token expires sooner). Refresh is single-flight: the cache lock is held
//! across the fetch, so concurrent callers wait for one request instead of
//! each starting their own.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default lifetime of a cached token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Lifetime in seconds, if the provider reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum TokenSource {
    Remote {
        client: reqwest::Client,
        auth_url: String,
        api_key: Option<String>,
        refresh_token: Option<String>,
    },
    Static(String),
}

struct Inner {
    source: TokenSource,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

/// Shared, cloneable handle to the token cache.
#[derive(Clone)]
pub struct TokenProvider {
    inner: Arc<Inner>,
}

impl TokenProvider {
    /// Provider backed by a remote token endpoint.
    ///
    /// # Arguments
    ///
    /// * `auth_url` - Base URL of the identity provider (without `/token`)
    /// * `api_key` - Project key sent as the `apikey` header
    /// * `refresh_token` - Long-lived session credential exchanged for access tokens
    /// * `ttl` - Upper bound on how long an access token is reused
    pub fn new(
        client: reqwest::Client,
        auth_url: &str,
        api_key: Option<String>,
        refresh_token: Option<String>,
        ttl: Duration,
    ) -> Self {
        Self::from_source(
            TokenSource::Remote {
                client,
                auth_url: auth_url.trim_end_matches('/').to_string(),
                api_key,
                refresh_token,
            },
            ttl,
        )
    }

    /// Provider that always hands out the same token.
    pub fn fixed(token: &str) -> Self {
        Self::from_source(TokenSource::Static(token.to_string()), DEFAULT_TOKEN_TTL)
    }

    fn from_source(source: TokenSource, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl,
                cached: Mutex::new(None),
            }),
        }
    }

    /// Return a valid access token, fetching a new one if the cache is empty
    /// or expired.
    pub async fn get_token(&self) -> anyhow::Result<String> {
        let mut cached = self.inner.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                return Ok(entry.token.clone());
            }
            debug!("Cached token expired");
        }

        let (token, lifetime) = self.fetch().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token)
    }

    /// Forget the cached token.
    pub async fn invalidate(&self) {
        self.inner.cached.lock().await.take();
    }

    async fn fetch(&self) -> anyhow::Result<(String, Duration)> {
        match &self.inner.source {
            TokenSource::Static(token) => Ok((token.clone(), self.inner.ttl)),
            TokenSource::Remote {
                client,
                auth_url,
                api_key,
                refresh_token,
            } => {
                let url = format!("{}/token?grant_type=refresh_token", auth_url);

                let mut request = client.post(&url).json(&RefreshRequest {
                    refresh_token: refresh_token.as_deref().unwrap_or_default(),
                });
                if let Some(key) = api_key {
                    request = request.header("apikey", key);
                }

                let response = request.send().await?.error_for_status()?;
                let data = response.json::<TokenResponse>().await?;

                let lifetime = data
                    .expires_in
                    .map(|secs| Duration::from_secs(secs).min(self.inner.ttl))
                    .unwrap_or(self.inner.ttl);

                info!(lifetime_secs = lifetime.as_secs(), "Fetched access token");
                Ok((data.access_token, lifetime))
            }
        }
    }
}
