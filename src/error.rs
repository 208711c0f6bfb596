//! Error types shared by the scraper, the store and the read API.
//!
//! Per-attempt failures inside the retrying executor are turned into data
//! (see [`crate::retry::AttemptEvent`]) and never leave it; everything else
//! propagates with `?` up to `main`, where it aborts the run.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid catalogue or command-line settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A navigation did not complete within the per-attempt timeout.
    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout {
        /// The page being loaded.
        url: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// HTTP transport or status error from the page fetcher.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other fetch failure reported by a fetcher implementation.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The loaded document could not be processed.
    #[error("extraction error: {0}")]
    Extract(String),

    /// Store access failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The YAML catalogue could not be parsed.
    #[error("catalogue parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
