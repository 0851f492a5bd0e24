//! Error types for plinth-fs

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Result type for plinth-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plinth-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error(
        "another run is already active on this target (pid {pid} on {host}, started {started_at}); lock file: {path}"
    )]
    LockHeld {
        path: PathBuf,
        pid: u32,
        host: String,
        started_at: DateTime<Utc>,
    },

    #[error("lock file {path} is unreadable: {message}")]
    LockCorrupt { path: PathBuf, message: String },

    #[error("path '{path}' is not repository-relative: {reason}")]
    PathEscapesRoot { path: String, reason: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
