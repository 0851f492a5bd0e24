//! Error types for plinth-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from plinth-core
    #[error(transparent)]
    Core(#[from] plinth_core::Error),

    /// Error from plinth-manifest
    #[error(transparent)]
    Manifest(#[from] plinth_manifest::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Hint printed under the error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Core(e) if e.is_retryable() => Some("wait for the other run to finish and retry"),
            Self::Core(plinth_core::Error::Manifest(plinth_manifest::Error::NotFound(_)))
            | Self::Manifest(plinth_manifest::Error::NotFound(_)) => {
                Some("pass --manifest, set PLINTH_MANIFEST or add plinth.toml to the target")
            }
            _ => None,
        }
    }
}
