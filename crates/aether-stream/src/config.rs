use std::time::Duration;

use crate::consumer::ConsumeOptions;
use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for the HTTP chat client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, for example `http://localhost:8000`.
    pub base_url: String,
    /// Upper bound on establishing the TCP/TLS connection.
    ///
    /// No whole-request timeout is applied; a reply streams for as long as
    /// chunks keep arriving within `read_timeout`.
    pub connect_timeout: Duration,
    /// Longest wait for the response to start and between two body chunks.
    /// `None` disables the limit.
    pub read_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl ClientConfig {
    /// Builds a config from process environment variables.
    ///
    /// - `AETHER_API_URL`: backend origin (default `http://localhost:8000`).
    /// - `AETHER_CONNECT_TIMEOUT_SECS`: connect timeout in seconds.
    /// - `AETHER_READ_TIMEOUT_SECS`: per-chunk read timeout in seconds, `0` disables it.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Some(url) = lookup("AETHER_API_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_secs(&lookup, "AETHER_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, "AETHER_READ_TIMEOUT_SECS")? {
            config.read_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the backend origin.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout; `None` disables it.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Checks that `base_url` is an `http` or `https` URL.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) URL, got {url:?}"
            )));
        }
        Ok(())
    }

    /// Consumer options derived from this config.
    pub fn consume_options(&self) -> ConsumeOptions {
        ConsumeOptions::default().read_timeout(self.read_timeout)
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url.trim_end_matches('/'))
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ClientError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("invalid {key}={raw:?}: {e}"))),
        _ => Ok(None),
    }
}
