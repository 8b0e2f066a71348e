//! Error types for boardsync

use thiserror::Error;

/// Result type alias for boardsync operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Unified error type for all boardsync operations
#[derive(Error, Debug, Clone)]
pub enum BoardError {
    /// The remote reports an empty collection identically for "not found"
    /// and "no permission"; a zero-board success shape becomes this error.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Complexity budget exhausted; carries the cool-down the remote asked for.
    #[error("Rate limited (cool-down {cooldown_secs}s): {message}")]
    RateLimited { message: String, cooldown_secs: u64 },

    /// Server fault that may succeed on retry
    #[error("Transient server error: {0}")]
    TransientServer(String),

    /// 500 with an empty body
    #[error("Internal server error: {0}")]
    InternalServer(String),

    /// 504 — terminal for the call, not retried further
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Label or column not known to the board schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A row's computed key already exists in the board's key map
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A configured key field resolved to no value on the row
    #[error("Missing key field: {0}")]
    MissingKeyField(String),

    /// Benign: a file cell with nothing behind it
    #[error("No files to download")]
    NoFilesToDownload,

    /// Network-level failure (DNS, TCP, TLS, read)
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(String),

    /// Board construction kept failing through the cache layer's retry budget
    #[error("Board unavailable: {0}")]
    BoardUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    /// True if the connection layer should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BoardError::RateLimited { .. }
                | BoardError::TransientServer(_)
                | BoardError::InternalServer(_)
                | BoardError::Transport(_)
        )
    }

    /// True for data-shape problems that must never be retried.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            BoardError::SchemaMismatch(_)
                | BoardError::DuplicateKey(_)
                | BoardError::MissingKeyField(_)
        )
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_access_denied() {
        let err = BoardError::AccessDenied("automation has no access to board [17]".to_string());
        assert_eq!(
            err.to_string(),
            "Access denied: automation has no access to board [17]"
        );
    }

    #[test]
    fn test_error_display_rate_limited() {
        let err = BoardError::RateLimited {
            message: "complexity budget exhausted".to_string(),
            cooldown_secs: 12,
        };
        assert_eq!(
            err.to_string(),
            "Rate limited (cool-down 12s): complexity budget exhausted"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(BoardError::TransientServer("boom".to_string()).is_retryable());
        assert!(BoardError::InternalServer("{}".to_string()).is_retryable());
        assert!(BoardError::RateLimited {
            message: "x".to_string(),
            cooldown_secs: 1
        }
        .is_retryable());
        assert!(!BoardError::GatewayTimeout("x".to_string()).is_retryable());
        assert!(!BoardError::AccessDenied("x".to_string()).is_retryable());
        assert!(!BoardError::DuplicateKey("x".to_string()).is_retryable());
    }

    #[test]
    fn test_is_data_error() {
        assert!(BoardError::DuplicateKey("k".to_string()).is_data_error());
        assert!(BoardError::MissingKeyField("f".to_string()).is_data_error());
        assert!(BoardError::SchemaMismatch("c".to_string()).is_data_error());
        assert!(!BoardError::Transport("t".to_string()).is_data_error());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: BoardError = json_err.into();
        assert!(matches!(err, BoardError::Json(_)));
    }
}
