//! Bearer credential acquisition.
//!
//! The client treats "get a valid bearer token for this request" as an
//! injected capability. The OAuth implementation refreshes the access token
//! through the throttled transport when it nears expiry and notifies an
//! injected observer of every refreshed token, so persistence stays out of
//! this module.

use crate::api::transport::ThrottledTransport;
use crate::api::{ApiError, ApiResult};
use crate::sync::config::TOKEN_EXPIRY_SKEW;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Boxed error an observer may return; surfaces as [`ApiError::Auth`].
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies a valid bearer token for each request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A bearer token that is valid right now.
    async fn bearer_token(&self) -> ApiResult<String>;
}

/// Observes token refreshes, typically to persist the new token.
///
/// An observer failure fails the refresh: losing a refreshed token would
/// strand the next run with a revoked credential.
pub trait TokenObserver: Send + Sync {
    /// Called with every freshly refreshed token.
    fn token_refreshed(&self, token: &OAuthToken) -> Result<(), ObserverError>;
}

/// An OAuth2 token pair with its expiry time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Bearer access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Unix seconds at which `access_token` expires.
    pub expires_at: i64,
}

impl OAuthToken {
    /// Whether the access token is expired (or close enough to expiry that
    /// it should not be used for a new request) at `now`.
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - TOKEN_EXPIRY_SKEW.as_secs() as i64 <= now
    }
}

/// Token endpoint response shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Refresh-token-grant OAuth2 credentials.
pub struct OAuthCredentials {
    transport: Arc<ThrottledTransport>,
    token_url: String,
    client_id: String,
    client_secret: String,
    observer: Option<Arc<dyn TokenObserver>>,
    current: Mutex<OAuthToken>,
}

impl OAuthCredentials {
    /// Create credentials seeded with a previously issued token.
    pub fn new(
        transport: Arc<ThrottledTransport>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token: OAuthToken,
    ) -> Self {
        Self {
            transport,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            observer: None,
            current: Mutex::new(token),
        }
    }

    /// Attach an observer notified of every refreshed token.
    pub fn with_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<OAuthToken> {
        debug!("access token near expiry, refreshing");
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let request = self.transport.http().post(&self.token_url).form(&form);
        let response = self.transport.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!(
                "token refresh failed with status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("token response: {e}")))?;

        let now = chrono::Utc::now().timestamp();
        let token = OAuthToken {
            access_token: parsed.access_token,
            // The endpoint may rotate the refresh token; keep the old one if
            // it does not.
            refresh_token: parsed
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            expires_at: now + parsed.expires_in,
        };
        info!(expires_at = token.expires_at, "access token refreshed");
        Ok(token)
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentials {
    async fn bearer_token(&self) -> ApiResult<String> {
        let mut current = self.current.lock().await;
        let now = chrono::Utc::now().timestamp();
        if !current.needs_refresh(now) {
            return Ok(current.access_token.clone());
        }

        let refreshed = self.refresh(&current.refresh_token).await?;
        if let Some(observer) = &self.observer {
            observer
                .token_refreshed(&refreshed)
                .map_err(|e| ApiError::Auth(format!("persisting refreshed token: {e}")))?;
        }
        *current = refreshed;
        Ok(current.access_token.clone())
    }
}

/// A fixed bearer token. Useful in tests and for short-lived tokens obtained
/// out of band.
pub struct StaticCredentials(String);

impl StaticCredentials {
    /// Wrap a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer_token(&self) -> ApiResult<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_refresh_window_applies_expiry_skew() {
        let token = OAuthToken {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: 1_000,
        };
        let skew = TOKEN_EXPIRY_SKEW.as_secs() as i64;
        assert!(!token.needs_refresh(1_000 - skew - 1));
        assert!(token.needs_refresh(1_000 - skew));
        assert!(token.needs_refresh(1_000));
    }

    #[tokio::test]
    async fn static_credentials_return_the_token_verbatim() {
        let creds = StaticCredentials::new("bearer-xyz");
        assert_eq!(creds.bearer_token().await.unwrap(), "bearer-xyz");
    }
}
