//! On-disk layout of plinth state inside a target repository
//!
//! ```text
//! <target>/
//!   plinth.toml                 default manifest location
//!   .plinth/
//!     config.toml               repository settings
//!     config.local.toml         local overrides (not committed)
//!     progress.toml             resumable progress record
//!     run.lock                  advisory run lock
//!     logs/<plugin>-step<N>.log run-command output
//!     backups/<plugin>/<time>/  files replaced by copy-file
//! ```

use std::path::{Path, PathBuf};

use plinth_manifest::DEFAULT_MANIFEST_FILENAME;

/// Name of the state directory at the target root.
pub const STATE_DIR: &str = ".plinth";

/// Paths of plinth state for one target repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    root: PathBuf,
}

impl TargetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn default_manifest(&self) -> PathBuf {
        self.root.join(DEFAULT_MANIFEST_FILENAME)
    }

    pub fn repo_config(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }

    pub fn local_config(&self) -> PathBuf {
        self.state_dir().join("config.local.toml")
    }

    pub fn progress_file(&self) -> PathBuf {
        self.state_dir().join("progress.toml")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir().join("run.lock")
    }

    /// Log file of one run-command step.
    pub fn step_log(&self, plugin_id: &str, step: usize) -> PathBuf {
        self.state_dir()
            .join("logs")
            .join(format!("{plugin_id}-step{step}.log"))
    }

    pub fn backups_dir(&self, plugin_id: &str) -> PathBuf {
        self.state_dir().join("backups").join(plugin_id)
    }
}
