//! Error types for configuration loading, external data queries and copies.

use std::path::PathBuf;

/// A sync entry or config document that could not be accepted.
///
/// Raised per entry: the offending entry is dropped and loading carries on.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed sync entry: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("{field} must be an absolute path, got {value:?}")]
    RelativePath { field: &'static str, value: String },

    #[error("periodic entry {path} has no Periodicity")]
    MissingPeriodicity { path: String },

    #[error("entry {path} has a zero Periodicity")]
    ZeroPeriodicity { path: String },

    #[error("entry {path} sets RetryAttempts without RetryInterval")]
    MissingRetryInterval { path: String },

    #[error("invalid duration {value:?}: {reason}")]
    Duration { value: String, reason: String },

    #[error("file entry {path} cannot carry include or exclude lists")]
    FilterOnFile { path: String },

    #[error("invalid include/exclude pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("duplicate sync entry for {path}")]
    Duplicate { path: String },

    #[error("malformed settings: {0}")]
    Settings(String),
}

/// A failed query against the external data provider.
#[derive(Debug, thiserror::Error)]
pub enum ExternalDataError {
    #[error("external data source unavailable: {0}")]
    Unavailable(String),

    #[error("external data field {field} is missing")]
    Missing { field: &'static str },

    #[error("malformed external data: {0}")]
    Malformed(String),

    #[error("failed to read external data at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failed copy attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("peer address or credentials are not resolved yet")]
    PeerUnavailable,

    #[error("peer {peer} is unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("authentication with peer {peer} failed")]
    Authentication { peer: String },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt may succeed. Only cancellation is final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
