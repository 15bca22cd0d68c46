use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, StreamError};
use crate::request::ChatRequest;
use crate::transport::{ByteStream, ChatTransport};

/// Body of `GET /api/health`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    /// Whether the backend has model credentials; without them it streams a
    /// canned fallback reply.
    #[serde(default)]
    pub openai_configured: bool,
}

impl HealthStatus {
    /// Returns `true` when the backend reports `ok`.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// [`ChatTransport`] over HTTP using `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport configured from `AETHER_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Returns the configuration this transport was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Queries the backend health endpoint.
    ///
    /// The whole request is bounded by the configured read timeout.
    pub async fn health(&self) -> Result<HealthStatus, StreamError> {
        let mut request = self.client.get(self.config.health_url());
        if let Some(limit) = self.config.read_timeout {
            request = request.timeout(limit);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("health request failed: {e}")))?;
        let response = ensure_success(response).await?;
        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| StreamError::transport(format!("invalid health response: {e}")))
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        debug!(url = %self.config.chat_url(), messages = request.messages.len(), "opening chat stream");
        let response = self
            .client
            .post(self.config.chat_url())
            .json(request)
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("chat request failed: {e}")))?;
        let response = ensure_success(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::transport(format!("stream read failed: {e}"))));
        Ok(Box::pin(body))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(StreamError::status(
        status.as_u16(),
        format!("backend returned {status}: {}", body.trim()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_base_url() {
        let err = HttpTransport::new(ClientConfig::default().base_url("ftp://host")).expect_err("invalid");
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn health_status_parses_backend_payload() {
        let status: HealthStatus = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "timestamp": "2026-10-18T09:00:00",
            "openai_configured": false
        }))
        .expect("parse");
        assert!(status.is_ok());
        assert!(!status.openai_configured);
    }
}
