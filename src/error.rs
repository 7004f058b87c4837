//! Error taxonomy for the ingestor.
//!
//! Errors fall into two groups:
//! - [`FetchError`]: per-request failures. The dispatcher logs them and drops
//!   the work item; they never abort a run.
//! - [`ConfigError`]: startup failures (no credentials, unreadable catalog, ...).
//!   Nothing useful can happen without a valid configuration, so these are fatal.
//!
//! [`SinkError`] covers writing a finished run to disk.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Failure of a single search request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a clean HTTP response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Upstream answered with a non-success status or an error payload.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    /// The body was not a well-formed search payload.
    #[error("malformed search payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Upstream { .. } => "upstream",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Invalid or unreachable configuration detected before any fetching starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no API credentials configured (set NEWS_API_KEYS or pass --api-key)")]
    MissingCredentials,

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("request timeout must be greater than zero")]
    InvalidTimeout,

    #[error("schedule interval must be greater than zero")]
    InvalidInterval,

    #[error("invalid search API base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read topic catalog {}: {source}", path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed topic catalog {}: {reason}", path.display())]
    CatalogFormat { path: PathBuf, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure while handing a finished run to the JSON sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize data points: {0}")]
    Serialize(#[from] serde_json::Error),
}
