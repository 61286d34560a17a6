use crate::domain::model::{Empty, ErrorEnvelope};
use crate::domain::ports::TokenSource;
use crate::utils::error::{Result, TmcError};
use crate::utils::validation::{validate_range, validate_url, Validate};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_RETRY_COUNT: u32 = 10;

/// Builds a pooled `reqwest::Client` honouring the timeout, TLS and pool
/// settings of `config`.
pub(crate) fn http_client(config: &TransportConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if let Some(ca_cert) = &config.ca_cert {
        let pem = std::fs::read(ca_cert)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }

    Ok(builder.build()?)
}

/// Splits `path?a=1&b=2` into the path and its decoded query pairs.
pub fn split_path_query(path: &str) -> (&str, Vec<(String, String)>) {
    match path.split_once('?') {
        Some((path, query)) => (
            path,
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (path, Vec::new()),
    }
}

/// Settings for the pooled HTTP client and its retry policy.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    /// Retries after the first attempt.
    pub retry_count: u32,
    pub retry_interval: Duration,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    /// Extra PEM root certificate, for private endpoints.
    pub ca_cert: Option<String>,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry_count: u32, retry_interval: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
            ca_cert: None,
            pool_max_idle_per_host: 16,
            user_agent: format!("tmc-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Validate for TransportConfig {
    fn validate(&self) -> Result<()> {
        validate_url("host", &self.host)?;
        validate_range("retry_count", self.retry_count, 0, MAX_RETRY_COUNT)?;
        if self.timeout.is_zero() {
            return Err(TmcError::InvalidConfigValue {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be greater than zero".to_string(),
            });
        }
        if let Some(ca_cert) = &self.ca_cert {
            crate::utils::validation::validate_file_exists("ca_cert", ca_cert)?;
        }
        Ok(())
    }
}

/// Shared handle to the control-plane API.
///
/// Clones share one connection pool and one default header map, so a token
/// installed through any clone is seen by all of them. Every request sends
/// a snapshot of the headers taken when the attempt starts.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    host: Url,
    retry_count: u32,
    retry_interval: Duration,
    headers: Arc<RwLock<HeaderMap>>,
}

impl Client {
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let mut host = Url::parse(&config.host)?;
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        tracing::debug!(
            "Created API client for {} (retries: {}, interval: {:?}, timeout: {:?})",
            host,
            config.retry_count,
            config.retry_interval,
            config.timeout
        );

        Ok(Self {
            http: http_client(&config)?,
            host,
            retry_count: config.retry_count,
            retry_interval: config.retry_interval,
            headers: Arc::new(RwLock::new(headers)),
        })
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn headers(&self) -> HeaderMap {
        self.headers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<()> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| TmcError::InvalidHeader {
                name: name.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|_| TmcError::InvalidHeader {
            name: name.to_string(),
        })?;
        self.insert_header(header_name, header_value);
        Ok(())
    }

    pub fn remove_header(&self, name: &str) {
        self.headers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);
    }

    pub fn set_bearer_token(&self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            TmcError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
            }
        })?;
        value.set_sensitive(true);
        self.insert_header(AUTHORIZATION, value);
        Ok(())
    }

    /// Fetches a token from `source` and installs it for all later requests.
    pub async fn authorize(&self, source: &dyn TokenSource) -> Result<()> {
        let token = source.access_token().await?;
        self.set_bearer_token(&token)?;
        tracing::debug!("Installed bearer token for {}", self.host);
        Ok(())
    }

    fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.headers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, value);
    }

    /// Resolves `path` against the host, percent-encoding each segment.
    pub fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self.host.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| TmcError::Config {
                message: format!("Host cannot be used as a base URL: {}", self.host),
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<R> {
        let url = self.url(path, query)?;
        self.invoke(Method::GET, url, None).await
    }

    pub async fn create<Q: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        request: &Q,
    ) -> Result<R> {
        let url = self.url(path, &[])?;
        let body = Self::marshal(request)?;
        self.invoke(Method::POST, url, Some(body)).await
    }

    pub async fn update<Q: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        request: &Q,
    ) -> Result<R> {
        let url = self.url(path, &[])?;
        let body = Self::marshal(request)?;
        self.invoke(Method::PUT, url, Some(body)).await
    }

    pub async fn patch<Q: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        request: &Q,
    ) -> Result<R> {
        let url = self.url(path, &[])?;
        let body = Self::marshal(request)?;
        self.invoke(Method::PATCH, url, Some(body)).await
    }

    pub async fn delete<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<R> {
        let url = self.url(path, query)?;
        self.invoke(Method::DELETE, url, None).await
    }

    /// DELETE that discards the response body.
    pub async fn delete_discard(&self, path: &str, query: &[(String, String)]) -> Result<()> {
        self.delete::<Empty>(path, query).await.map(|_| ())
    }

    fn marshal<Q: Serialize + ?Sized>(request: &Q) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(request)?))
    }

    /// Sends the request up to `retry_count + 1` times.
    ///
    /// Transport failures and 5xx answers sleep `retry_interval` and try
    /// again; any other non-200 answer is returned at once.
    async fn invoke<R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
    ) -> Result<R> {
        let attempts = self.retry_count + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!("{} {} (attempt {}/{})", method, url, attempt, attempts);

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(self.headers());
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            let outcome = match request.send().await {
                Ok(response) => Self::read_response(response).await,
                Err(e) => Err(TmcError::Transport(e)),
            };

            match outcome {
                Ok(payload) => return Self::unmarshal(&payload),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        method,
                        url,
                        attempt,
                        attempts,
                        e,
                        self.retry_interval
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            "{} {} failed after {} attempts: {}",
                            method,
                            url,
                            attempts,
                            e
                        );
                    } else {
                        tracing::debug!("{} {} failed: {}", method, url, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn read_response(response: reqwest::Response) -> Result<Bytes> {
        let status = response.status();
        let payload = response.bytes().await?;
        tracing::debug!("Response status: {} ({} bytes)", status, payload.len());

        if status == StatusCode::OK {
            return Ok(payload);
        }

        Err(TmcError::Http {
            status,
            message: Self::error_message(&payload),
        })
    }

    fn error_message(payload: &[u8]) -> String {
        let envelope = serde_json::from_slice::<ErrorEnvelope>(payload).ok();
        envelope
            .and_then(|e| {
                let non_empty = |m: &String| !m.trim().is_empty();
                e.message.filter(non_empty).or(e.error.filter(non_empty))
            })
            .unwrap_or_else(|| String::from_utf8_lossy(payload).trim().to_string())
    }

    fn unmarshal<R: DeserializeOwned>(payload: &[u8]) -> Result<R> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(payload)?)
    }
}
