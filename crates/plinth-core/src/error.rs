//! Error types for plinth-core

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use plinth_manifest::OptionProblem;

use crate::conflict::Conflict;
use crate::progress::PluginStatus;

/// Result type for plinth-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// A plugin id that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPlugin {
    pub id: String,
    /// The plugin that depends on it, or `None` if it was requested directly.
    pub referenced_by: Option<String>,
}

impl fmt::Display for MissingPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.referenced_by {
            Some(parent) => write!(f, "'{}' (required by '{parent}')", self.id),
            None => write!(f, "'{}' (requested)", self.id),
        }
    }
}

fn bullet_list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("\n  - {item}"))
        .collect()
}

/// Errors that can occur in plinth-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested or referenced plugins missing from the catalog
    #[error("unresolved plugins:{}", bullet_list(.missing))]
    DependencyUnresolved { missing: Vec<MissingPlugin> },

    /// The dependency graph contains a cycle
    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    /// Invalid option assignments or values
    #[error("invalid options:{}", bullet_list(.problems))]
    Options { problems: Vec<OptionProblem> },

    /// Plugins in the plan collide on outputs or namespace tokens
    #[error("conflicting plugins, nothing was changed:{}", bullet_list(.conflicts))]
    Conflict { conflicts: Vec<Conflict> },

    /// Another live run holds the target
    #[error("target is locked by pid {pid} on {host} since {started_at} ({path}); retry when it finishes")]
    LockContention {
        path: PathBuf,
        pid: u32,
        host: String,
        started_at: DateTime<Utc>,
    },

    /// Rejected progress state change
    #[error("plugin '{plugin}' cannot move from {from} to {to}")]
    InvalidTransition {
        plugin: String,
        from: PluginStatus,
        to: PluginStatus,
    },

    /// Progress record could not be parsed or serialized
    #[error("progress record {path} is unreadable: {message}")]
    Progress { path: PathBuf, message: String },

    /// Settings file could not be parsed
    #[error("invalid settings in {path}: {message}")]
    Settings { path: PathBuf, message: String },

    /// A step could not be prepared (payload read, rendering)
    #[error("plugin '{plugin}' step {step}: {message}")]
    Step {
        plugin: String,
        step: usize,
        message: String,
    },

    /// Manifest loading or validation error from plinth-manifest
    #[error(transparent)]
    Manifest(#[from] plinth_manifest::Error),

    /// Filesystem error from plinth-fs
    #[error(transparent)]
    Fs(#[from] plinth_fs::Error),

    /// Managed block error from plinth-blocks
    #[error(transparent)]
    Blocks(#[from] plinth_blocks::Error),
}

impl Error {
    /// Whether the error was raised before anything could be mutated
    /// because the request or catalog is invalid.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DependencyUnresolved { .. }
                | Self::Cycle { .. }
                | Self::Options { .. }
                | Self::Conflict { .. }
                | Self::Manifest(plinth_manifest::Error::Validation(_))
        )
    }

    /// Whether retrying later can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockContention { .. })
    }
}
