use crate::core::transport::{http_client, TransportConfig};
use crate::domain::ports::TokenSource;
use crate::utils::error::{Result, TmcError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_ISSUER: &str = "https://console.cloud.vmware.com";
const AUTHORIZE_PATH: &str = "csp/gateway/am/api/auth/api-tokens/authorize";

/// Tokens are refreshed this long before the issuer says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A fixed, already-valid access token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(TmcError::Auth {
                message: "API token is empty".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Exchanges a long-lived refresh token for short-lived access tokens and
/// caches the result until shortly before it expires.
pub struct RefreshTokenExchange {
    http: reqwest::Client,
    issuer: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshTokenExchange {
    pub fn new(issuer: impl Into<String>, refresh_token: impl Into<String>) -> Result<Self> {
        Self::with_transport(issuer, refresh_token, &TransportConfig::default())
    }

    /// Talks to the issuer with the same timeout, TLS roots and certificate
    /// policy as the API client.
    pub fn with_transport(
        issuer: impl Into<String>,
        refresh_token: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self> {
        let issuer = issuer.into();
        crate::utils::validation::validate_url("auth.issuer", &issuer)?;

        Ok(Self {
            http: http_client(transport)?,
            issuer,
            refresh_token: refresh_token.into(),
            cached: Mutex::new(None),
        })
    }

    async fn exchange(&self) -> Result<AuthorizeResponse> {
        let url = format!("{}/{}", self.issuer.trim_end_matches('/'), AUTHORIZE_PATH);
        tracing::debug!("Exchanging refresh token at {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[("refresh_token", self.refresh_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TmcError::Auth {
                message: format!("token exchange returned {}: {}", status, body.trim()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenSource for RefreshTokenExchange {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let lifetime = Duration::from_secs(fresh.expires_in.unwrap_or(0));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);
        tracing::info!("Obtained access token (valid for {:?})", lifetime);

        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at,
        });
        Ok(fresh.access_token)
    }
}
