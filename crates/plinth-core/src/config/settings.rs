use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-step timeout for run-command steps.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 600;

/// Default age after which a run lock is considered stale.
pub const DEFAULT_LOCK_STALE_SECS: u64 = 3600;

/// One settings file. Every key is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_stale_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl SettingsLayer {
    /// Make a relative `manifest` path relative to `base` instead.
    pub(crate) fn anchor(mut self, base: &Path) -> Self {
        if let Some(manifest) = &self.manifest {
            if manifest.is_relative() {
                self.manifest = Some(base.join(manifest));
            }
        }
        self
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: SettingsLayer) {
        if other.manifest.is_some() {
            self.manifest = other.manifest;
        }
        if other.step_timeout_secs.is_some() {
            self.step_timeout_secs = other.step_timeout_secs;
        }
        if other.lock_stale_secs.is_some() {
            self.lock_stale_secs = other.lock_stale_secs;
        }
        if other.jobs.is_some() {
            self.jobs = other.jobs;
        }
    }
}

/// Effective settings after merging every layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Manifest path, if configured
    pub manifest: Option<PathBuf>,
    pub step_timeout_secs: u64,
    pub lock_stale_secs: u64,
    /// Worker count for sibling plugins; 1 runs sequentially
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest: None,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            lock_stale_secs: DEFAULT_LOCK_STALE_SECS,
            jobs: 1,
        }
    }
}

impl From<SettingsLayer> for Settings {
    fn from(layer: SettingsLayer) -> Self {
        let defaults = Settings::default();
        Self {
            manifest: layer.manifest,
            step_timeout_secs: layer
                .step_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(defaults.step_timeout_secs),
            lock_stale_secs: layer.lock_stale_secs.unwrap_or(defaults.lock_stale_secs),
            jobs: layer.jobs.filter(|j| *j > 0).unwrap_or(defaults.jobs),
        }
    }
}

impl Settings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}
