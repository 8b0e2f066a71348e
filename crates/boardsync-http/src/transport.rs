//! Transport: one request out, status and payload back

use crate::config::ApiConfig;
use boardsync_common::{BoardError, Result};
use std::time::Duration;

/// Raw response from a single round-trip, before classification
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body).map_err(|e| BoardError::Json(e.to_string()))
    }
}

/// Executes a single request. Everything above this (retry, backoff,
/// classification) lives in `Connection`.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

/// Blocking HTTP transport with connection pooling
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a pooled client from the config
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| BoardError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let mut request = self.client.post(url).timeout(timeout).json(payload);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .map_err(|e| BoardError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| BoardError::Transport(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish()
    }
}
