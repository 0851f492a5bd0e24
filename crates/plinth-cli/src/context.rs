//! Target repository context
//!
//! Resolves the target root, its layered settings and which manifest to use.
//!
//! Manifest resolution order:
//!
//! 1. `--manifest` / `PLINTH_MANIFEST`
//! 2. `manifest` from settings
//! 3. the manifest recorded by the last run (progress record)
//! 4. `<target>/plinth.toml`

use std::path::{Path, PathBuf};

use plinth_core::{CancelFlag, Orchestrator, ProgressTracker, Settings, SettingsResolver, TargetLayout};
use plinth_manifest::Manifest;

use crate::error::{CliError, Result};

/// A target repository with its effective settings.
#[derive(Debug)]
pub struct TargetContext {
    root: PathBuf,
    settings: Settings,
    manifest_flag: Option<PathBuf>,
}

impl TargetContext {
    /// Resolve the target at `repo` (or the current directory).
    pub fn resolve(repo: Option<&Path>, manifest_flag: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = match repo {
            Some(repo) if repo.is_absolute() => repo.to_path_buf(),
            Some(repo) => cwd.join(repo),
            None => cwd.clone(),
        };
        if !root.is_dir() {
            return Err(CliError::user(format!(
                "target {} is not a directory",
                root.display()
            )));
        }
        let settings = SettingsResolver::new(&root).resolve()?;
        tracing::debug!(root = %root.display(), ?settings, "resolved target");
        Ok(Self {
            root,
            settings,
            manifest_flag: manifest_flag.map(|m| if m.is_absolute() { m.to_path_buf() } else { cwd.join(m) }),
        })
    }

    /// Manifest path after applying the resolution order.
    pub fn manifest_path(&self) -> Result<PathBuf> {
        if let Some(flag) = &self.manifest_flag {
            return Ok(flag.clone());
        }
        if let Some(configured) = &self.settings.manifest {
            return Ok(configured.clone());
        }
        let tracker = ProgressTracker::load(&self.root)?;
        if let Some(recorded) = &tracker.record().manifest {
            return Ok(recorded.clone());
        }
        Ok(TargetLayout::new(&self.root).default_manifest())
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path()?;
        tracing::debug!(path = %path.display(), "using manifest");
        Ok(Manifest::load(path)?)
    }

    pub fn orchestrator(&self, cancel: CancelFlag) -> Result<Orchestrator> {
        let manifest = self.load_manifest()?;
        let orchestrator = Orchestrator::new(&self.root, manifest, self.settings.clone())?;
        Ok(orchestrator.with_cancel_flag(cancel))
    }
}
