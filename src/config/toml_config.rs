use crate::config::{AuthSettings, Settings};
use crate::core::transport::{TransportConfig, DEFAULT_RETRY_COUNT, MAX_RETRY_COUNT};
use crate::utils::error::{Result, TmcError};
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub client: ClientSection,
    pub retry: Option<RetrySection>,
    pub auth: Option<AuthSection>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub insecure: Option<bool>,
    pub ca_cert: Option<String>,
    pub pool_max_idle_per_host: Option<usize>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    pub count: Option<u32>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// Long-lived refresh token, exchanged at `issuer`.
    pub api_token: Option<String>,
    /// Ready-to-use bearer token.
    pub access_token: Option<String>,
    pub issuer: Option<String>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TmcError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the value of the environment variable. Unset
    /// variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            TmcError::Config {
                message: format!("Invalid substitution pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn retry_count(&self) -> u32 {
        self.retry
            .as_ref()
            .and_then(|r| r.count)
            .unwrap_or(DEFAULT_RETRY_COUNT)
    }

    pub fn transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::new(self.client.endpoint.clone());
        config.retry_count = self.retry_count();
        if let Some(interval) = self.retry.as_ref().and_then(|r| r.interval_ms) {
            config.retry_interval = Duration::from_millis(interval);
        }
        if let Some(timeout) = self.client.timeout_seconds {
            config.timeout = Duration::from_secs(timeout);
        }
        config.accept_invalid_certs = self.client.insecure.unwrap_or(false);
        config.ca_cert = self.client.ca_cert.clone();
        if let Some(pool) = self.client.pool_max_idle_per_host {
            config.pool_max_idle_per_host = pool;
        }
        if let Some(user_agent) = &self.client.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }

    pub fn into_settings(self) -> Settings {
        let transport = self.transport_config();
        let auth = match self.auth {
            Some(auth) => AuthSettings::from_parts(auth.api_token, auth.access_token, auth.issuer),
            None => AuthSettings::None,
        };
        Settings {
            transport,
            auth,
            headers: self.headers.unwrap_or_default(),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_url("client.endpoint", &self.client.endpoint)?;
        validate_range("retry.count", self.retry_count(), 0, MAX_RETRY_COUNT)?;
        if let Some(timeout) = self.client.timeout_seconds {
            validate_range("client.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(issuer) = self.auth.as_ref().and_then(|a| a.issuer.as_deref()) {
            validate_url("auth.issuer", issuer)?;
        }
        Ok(())
    }
}
