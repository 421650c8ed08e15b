//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the file-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be decoded.
    #[error("corrupt record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An insert collided with an existing session or idempotency key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A save targeted a session that was never inserted.
    #[error("session {0} does not exist")]
    Missing(String),

    /// A session id cannot be used as a file name.
    #[error("invalid session id: {0:?}")]
    InvalidId(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
