//! Error types for TradeScout.
//!
//! Library crates use [`TradeScoutError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all TradeScout operations.
#[derive(Debug, thiserror::Error)]
pub enum TradeScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// An external API answered with a non-success status.
    #[error("{service} API error {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Response or file content could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Tabular data loading or manipulation error.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (missing fields, bad template, unknown column).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Session lookup or lifecycle error.
    #[error("session error: {0}")]
    Session(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TradeScoutError>;

impl TradeScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a dataset error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Create a session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same request may succeed (rate limits, 5xx, transport).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TradeScoutError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = TradeScoutError::Api {
            service: "groq",
            status: 401,
            message: "invalid key".into(),
        };
        assert_eq!(err.to_string(), "groq API error 401: invalid key");
    }

    #[test]
    fn transient_classification() {
        let rate_limited = TradeScoutError::Api {
            service: "tavily",
            status: 429,
            message: String::new(),
        };
        assert!(rate_limited.is_transient());

        let unauthorized = TradeScoutError::Api {
            service: "tavily",
            status: 401,
            message: String::new(),
        };
        assert!(!unauthorized.is_transient());

        assert!(TradeScoutError::Network("reset".into()).is_transient());
        assert!(!TradeScoutError::validation("bad").is_transient());
    }
}
