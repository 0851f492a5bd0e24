//! Settings resolution with layered merge

use std::path::{Path, PathBuf};

use super::settings::{Settings, SettingsLayer};
use crate::layout::TargetLayout;
use crate::{Error, Result};

/// Resolves settings by merging the global, repository and local layers
///
/// Later layers override earlier ones key by key. Missing layers are
/// skipped; a layer that exists but does not parse is an error.
pub struct SettingsResolver {
    layout: TargetLayout,

    /// Override for the global config directory (used for testing).
    /// When `None`, the platform-appropriate directory is used via `dirs::config_dir()`.
    global_config_dir_override: Option<PathBuf>,
}

impl SettingsResolver {
    /// Create a resolver for the target repository at `root`
    ///
    /// Uses the platform-appropriate global config directory:
    /// - Linux: `~/.config/plinth/`
    /// - macOS: `~/Library/Application Support/plinth/`
    /// - Windows: `%APPDATA%\plinth\`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: TargetLayout::new(root),
            global_config_dir_override: None,
        }
    }

    /// Create a resolver with a custom global config directory.
    pub fn with_global_config_dir(root: impl Into<PathBuf>, global_config_dir: PathBuf) -> Self {
        Self {
            layout: TargetLayout::new(root),
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("plinth"))
    }

    /// Merge every layer into effective settings.
    ///
    /// Relative `manifest` paths are anchored at the directory that owns the
    /// layer: the global config directory or the target root.
    pub fn resolve(&self) -> Result<Settings> {
        let mut merged = SettingsLayer::default();

        if let Some(global_dir) = self.global_config_dir() {
            let global_path = global_dir.join("config.toml");
            if let Some(layer) = load_layer(&global_path)? {
                tracing::debug!(path = %global_path.display(), "loaded global settings");
                merged.merge(layer.anchor(&global_dir));
            }
        }

        for path in [self.layout.repo_config(), self.layout.local_config()] {
            if let Some(layer) = load_layer(&path)? {
                tracing::debug!(path = %path.display(), "loaded repository settings");
                merged.merge(layer.anchor(self.layout.root()));
            }
        }

        Ok(Settings::from(merged))
    }

    /// Target repository root
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Check if repository settings exist
    pub fn has_config(&self) -> bool {
        self.layout.repo_config().is_file()
    }

    /// Check if local overrides exist
    pub fn has_local_overrides(&self) -> bool {
        self.layout.local_config().is_file()
    }
}

fn load_layer(path: &Path) -> Result<Option<SettingsLayer>> {
    let Some(content) = plinth_fs::io::read_text_optional(path)? else {
        return Ok(None);
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn isolated(root: &Path) -> (SettingsResolver, TempDir) {
        let global = TempDir::new().unwrap();
        let resolver = SettingsResolver::with_global_config_dir(root, global.path().to_path_buf());
        (resolver, global)
    }

    #[test]
    fn defaults_without_any_layer() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _global) = isolated(temp_dir.path());

        assert!(!resolver.has_config());
        assert!(!resolver.has_local_overrides());
        assert_eq!(resolver.resolve().unwrap(), Settings::default());
    }

    #[test]
    fn local_overrides_repo_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, global) = isolated(temp_dir.path());

        std::fs::write(
            global.path().join("config.toml"),
            "jobs = 8\nstep_timeout_secs = 30\nlock_stale_secs = 60\n",
        )
        .unwrap();
        let state = temp_dir.path().join(".plinth");
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(state.join("config.toml"), "jobs = 2\nmanifest = \"tooling/plinth.yaml\"\n")
            .unwrap();
        std::fs::write(state.join("config.local.toml"), "step_timeout_secs = 5\n").unwrap();

        let settings = resolver.resolve().unwrap();
        assert_eq!(settings.jobs, 2);
        assert_eq!(settings.step_timeout_secs, 5);
        assert_eq!(settings.lock_stale_secs, 60);
        assert_eq!(
            settings.manifest,
            Some(temp_dir.path().join("tooling/plinth.yaml"))
        );
    }

    #[test]
    fn unknown_keys_are_reported_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _global) = isolated(temp_dir.path());
        let state = temp_dir.path().join(".plinth");
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(state.join("config.toml"), "threads = 3\n").unwrap();

        let err = resolver.resolve().unwrap_err();
        assert!(matches!(err, Error::Settings { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn zero_jobs_falls_back_to_sequential() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _global) = isolated(temp_dir.path());
        let state = temp_dir.path().join(".plinth");
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(state.join("config.toml"), "jobs = 0\n").unwrap();

        assert_eq!(resolver.resolve().unwrap().jobs, 1);
    }
}
