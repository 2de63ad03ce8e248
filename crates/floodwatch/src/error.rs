//! Error types for floodwatch.
//!
//! Request-time feed failures and startup configuration failures live here.
//! Camera analysis has its own recoverable error type in
//! [`crate::analyzer::AnalysisError`], which never escapes the merger.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for floodwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Feed Errors ===
    /// The road alert feed could not be retrieved.
    #[error("failed to fetch feed {url}: {message}")]
    FeedFetch {
        /// The feed URL.
        url: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The feed was retrieved but is not a syndication document we understand.
    #[error("failed to parse feed {url}: {source}")]
    FeedParse {
        /// The feed URL.
        url: String,
        /// The underlying parser error.
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// An HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    // === Server Errors ===
    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An operation did not finish before its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    // === I/O Errors ===
    /// File system or socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file that was explicitly requested does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigNotFound {
        /// The missing path.
        path: PathBuf,
    },
}

/// A specialized Result type for floodwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a feed fetch error.
    #[must_use]
    pub fn feed_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FeedFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error came from reaching or reading the feed.
    #[must_use]
    pub fn is_feed_error(&self) -> bool {
        matches!(self, Self::FeedFetch { .. } | Self::FeedParse { .. })
    }

    /// Check if this error is a startup configuration problem.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::ConfigNotFound { .. }
        )
    }
}
