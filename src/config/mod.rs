#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::auth::{RefreshTokenExchange, StaticToken, DEFAULT_ISSUER};
use crate::core::transport::{Client, TransportConfig};
use crate::domain::ports::TokenSource;
use crate::utils::error::{Result, TmcError};
use crate::utils::validation::Validate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "TMC_ENDPOINT";
pub const ENV_API_TOKEN: &str = "TMC_API_TOKEN";
pub const ENV_ACCESS_TOKEN: &str = "TMC_ACCESS_TOKEN";
pub const ENV_ISSUER: &str = "TMC_ISSUER";
pub const ENV_RETRY_COUNT: &str = "TMC_RETRY_COUNT";
pub const ENV_RETRY_INTERVAL_MS: &str = "TMC_RETRY_INTERVAL_MS";
pub const ENV_INSECURE: &str = "TMC_INSECURE";

/// How requests authenticate. A refresh token wins over an access token
/// when both are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSettings {
    None,
    AccessToken(String),
    RefreshToken { token: String, issuer: String },
}

impl AuthSettings {
    pub fn from_parts(
        api_token: Option<String>,
        access_token: Option<String>,
        issuer: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match (non_empty(api_token), non_empty(access_token)) {
            (Some(token), _) => AuthSettings::RefreshToken {
                token,
                issuer: non_empty(issuer).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            },
            (None, Some(token)) => AuthSettings::AccessToken(token),
            (None, None) => AuthSettings::None,
        }
    }

    /// The exchange, if any, reuses `transport`'s timeout and TLS settings.
    pub fn token_source(
        &self,
        transport: &TransportConfig,
    ) -> Result<Option<Arc<dyn TokenSource>>> {
        let source: Arc<dyn TokenSource> = match self {
            AuthSettings::None => return Ok(None),
            AuthSettings::AccessToken(token) => Arc::new(StaticToken::new(token.clone())),
            AuthSettings::RefreshToken { token, issuer } => Arc::new(
                RefreshTokenExchange::with_transport(issuer.clone(), token.clone(), transport)?,
            ),
        };
        Ok(Some(source))
    }
}

/// Everything needed to build an authorized [`Client`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: TransportConfig,
    pub auth: AuthSettings,
    pub headers: BTreeMap<String, String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_ENDPOINT).ok_or_else(|| TmcError::MissingConfig {
            field: ENV_ENDPOINT.to_string(),
        })?;

        let mut transport = TransportConfig::new(endpoint);
        if let Some(count) = lookup(ENV_RETRY_COUNT) {
            transport.retry_count = parse_env(ENV_RETRY_COUNT, &count)?;
        }
        if let Some(interval) = lookup(ENV_RETRY_INTERVAL_MS) {
            transport.retry_interval =
                Duration::from_millis(parse_env(ENV_RETRY_INTERVAL_MS, &interval)?);
        }
        transport.accept_invalid_certs = lookup(ENV_INSECURE)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            transport,
            auth: AuthSettings::from_parts(
                lookup(ENV_API_TOKEN),
                lookup(ENV_ACCESS_TOKEN),
                lookup(ENV_ISSUER),
            ),
            headers: BTreeMap::new(),
        })
    }

    /// Builds the client, installs extra headers and fetches a token.
    ///
    /// The token is installed once. Use [`Settings::connect_with_source`]
    /// to keep the source and re-authorize a long-lived client.
    pub async fn connect(&self) -> Result<Client> {
        let (client, _) = self.connect_with_source().await?;
        Ok(client)
    }

    /// Like [`Settings::connect`], also returning the token source so the
    /// caller can call [`Client::authorize`] again before the token expires.
    /// A refresh-token source answers from its cache until then.
    pub async fn connect_with_source(&self) -> Result<(Client, Option<Arc<dyn TokenSource>>)> {
        let client = Client::new(self.transport.clone())?;
        for (name, value) in &self.headers {
            client.set_header(name, value)?;
        }
        let source = self.auth.token_source(&self.transport)?;
        if let Some(source) = &source {
            client.authorize(source.as_ref()).await?;
        }
        Ok((client, source))
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        self.transport.validate()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TmcError::InvalidConfigValue {
            field: key.to_string(),
            value: value.to_string(),
            reason: "Not a valid number".to_string(),
        })
}
