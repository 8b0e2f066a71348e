//! Connection configuration

use boardsync_common::{BoardError, Result};
use std::time::Duration;

/// Configuration for a remote board connection
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Endpoint the structured query payloads are posted to
    pub endpoint: String,

    /// Authorization token sent on every request
    pub token: String,

    /// Account name used in access-denied messages when known
    pub account: Option<String>,

    /// Value of the API version header
    pub api_version: String,

    /// Per-request timeout (large boards can take a while)
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User-Agent header value
    pub user_agent: String,
}

impl ApiConfig {
    /// Create a config for the given endpoint and token, defaults elsewhere
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            account: None,
            api_version: "2023-10".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
            user_agent: format!("boardsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the account name used in access-denied messages
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set the API version header value
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-request timeout from seconds
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = Duration::from_secs_f64(secs);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set max idle connections per host
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check that the endpoint is an absolute URL before a client is built
    /// around it.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint).map_err(|err| {
            BoardError::Transport(format!("invalid endpoint [{}]: {}", self.endpoint, err))
        })?;
        Ok(())
    }
}
