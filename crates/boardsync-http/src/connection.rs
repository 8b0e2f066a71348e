//! Connection and retry layer
//!
//! Wraps a `Transport` with rate-budget awareness: classifies every response
//! into success, rate-limit-exceeded, transient-server-error, or hard error,
//! sleeps out the remote's advertised cool-down, and retries up to a fixed
//! attempt budget. Callers only ever see a normalized `Result`.

use crate::config::ApiConfig;
use crate::transport::{HttpTransport, Transport};
use boardsync_common::{BoardError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Maximum attempts per logical request, including the first one
pub const MAX_ATTEMPTS: u32 = 5;

/// Fixed pause before retrying a transient server fault
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(2500);

/// Cool-down used when the rate-limit message cannot be parsed
const COOLDOWN_FALLBACK_SECS: u64 = 60;

/// Abstraction over blocking sleeps so tests can observe back-off without
/// waiting it out.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Default sleeper: blocks the calling thread
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A connection to one remote board
pub struct Connection {
    board_id: i64,
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl Connection {
    /// Connect with the default HTTP transport
    pub fn new(board_id: i64, config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(board_id, config, transport))
    }

    /// Connect over an injected transport (tests, alternative stacks)
    pub fn with_transport(board_id: i64, config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            board_id,
            config,
            transport,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Replace the sleeper used for back-off pauses
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn board_id(&self) -> i64 {
        self.board_id
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), self.config.token.clone()),
            ("API-Version".to_string(), self.config.api_version.clone()),
        ]
    }

    /// Execute one structured payload against the remote, retrying within
    /// the attempt budget. Returns the parsed response document.
    pub fn execute(&self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        tracing::debug!("ready to execute payload = [{}]", payload);
        let headers = self.headers();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = self
                .transport
                .post(&self.config.endpoint, payload, &headers, self.config.timeout)
                .and_then(|response| classify_response(response.status, &response.body));
            tracing::debug!(
                "completed remote request in {:.3} seconds",
                started.elapsed().as_secs_f64()
            );

            match outcome {
                Ok(document) => return self.check_access(document),
                Err(err) if err.is_retryable() => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(err);
                    }
                    match &err {
                        BoardError::RateLimited { cooldown_secs, .. } => {
                            tracing::info!(
                                "complexity budget exhausted, sleeping for {} seconds",
                                cooldown_secs
                            );
                            self.sleeper.sleep(Duration::from_secs(cooldown_secs + 1));
                        }
                        _ => {
                            tracing::error!("retry count = [{}], {}", attempt, err);
                            self.sleeper.sleep(TRANSIENT_BACKOFF);
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The remote reports an empty collection identically for "not found"
    /// and "no permission", so a successful zero-board shape is converted
    /// into access-denied here.
    fn check_access(&self, document: serde_json::Value) -> Result<serde_json::Value> {
        if let Some(boards) = document["data"]["boards"].as_array() {
            if boards.is_empty() {
                let account = self
                    .config
                    .account
                    .as_deref()
                    .unwrap_or("automation")
                    .to_string();
                return Err(BoardError::AccessDenied(format!(
                    "{} does not have access to board [{}]",
                    account, self.board_id
                )));
            }
        }

        if let Some(complexity) = document["data"]["complexity"].as_object() {
            tracing::info!(
                "complexity query: [{:?}], remaining budget: [{:?}]",
                complexity.get("query"),
                complexity.get("after")
            );
        }

        Ok(document)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("board_id", &self.board_id)
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

/// Classify a raw response into the error taxonomy
fn classify_response(status: u16, body: &str) -> Result<serde_json::Value> {
    if status == 500 {
        if body.trim().is_empty() || body.trim() == "{}" {
            return Err(BoardError::InternalServer(
                "internal server error (empty body)".to_string(),
            ));
        }
        return Err(BoardError::TransientServer(body.to_string()));
    }

    if status == 504 {
        return Err(BoardError::GatewayTimeout("gateway timeout".to_string()));
    }

    let document: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            return Err(BoardError::Transport(format!(
                "unparseable response (status {}): {}",
                status, err
            )))
        }
    };

    let errors = document.get("errors").and_then(|e| e.as_array());
    if status == 200 && errors.is_none() {
        return Ok(document);
    }

    if let Some(errors) = errors {
        // The complexity budget is reported as free text inside the error
        // list; the reset duration has to be fished out of the message.
        if body.to_lowercase().contains("complexity") {
            let mut message = String::new();
            let mut cooldown_secs = COOLDOWN_FALLBACK_SECS;
            for entry in errors {
                let text = entry
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| entry["message"].as_str().unwrap_or_default().to_string());
                if text.contains("reset in") {
                    cooldown_secs = parse_cooldown_seconds(&text);
                }
                message.push_str(&text);
                message.push('\n');
            }
            return Err(BoardError::RateLimited {
                message,
                cooldown_secs,
            });
        }

        return Err(BoardError::Internal(body.to_string()));
    }

    if status == 404 {
        return Err(BoardError::NotFound(body.to_string()));
    }

    Err(BoardError::Internal(format!(
        "remote error (status {}): {}",
        status, body
    )))
}

/// Extract the cool-down from a rate-limit message.
///
/// The remote embeds the reset duration in free text ("... reset in 24
/// seconds"); the contract is the second-to-last whitespace token. This is
/// fragile by nature, so it lives in one place and falls back to 60 seconds
/// when the token does not parse.
pub fn parse_cooldown_seconds(message: &str) -> u64 {
    let tokens: Vec<&str> = message.split_whitespace().collect();
    if tokens.len() < 2 {
        return COOLDOWN_FALLBACK_SECS;
    }
    tokens[tokens.len() - 2]
        .parse::<u64>()
        .unwrap_or(COOLDOWN_FALLBACK_SECS)
}
