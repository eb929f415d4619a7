use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The service answered with an `ERROR...` line.
    #[error("{action} failed: {message}")]
    Service { action: String, message: String },

    /// The service answered `false` (or nothing, for a write).
    #[error("{action} was rejected by the persistence service")]
    Rejected { action: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected reply to {action}: {reply}")]
    UnexpectedReply { action: String, reply: String },

    #[error("request dispatcher is shut down")]
    Disconnected,
}

impl StoreError {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect(),
            Self::Io { .. } | Self::Disconnected => true,
            _ => false,
        }
    }
}
