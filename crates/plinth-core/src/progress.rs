//! Resumable progress record
//!
//! The record lives at `<target>/.plinth/progress.toml` and is rewritten
//! atomically after every step attempt, so an interrupted run can resume at
//! the first step that has not completed.
//!
//! Plugin status follows a small state machine:
//!
//! ```text
//! not_started -> in_progress -> complete
//!                     |      -> failed -> in_progress
//!  (any) -> not_started   only on a forced reset
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::layout::TargetLayout;
use crate::{Error, Result};

/// Progress record format version.
pub const PROGRESS_VERSION: u32 = 1;

/// Installation status of one plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Failed,
}

impl PluginStatus {
    /// Whether moving from `self` to `next` is allowed. Moving back to
    /// `not_started` requires `force`.
    pub fn can_transition_to(self, next: Self, force: bool) -> bool {
        use PluginStatus::*;
        match (self, next) {
            (NotStarted, InProgress)
            | (InProgress, Complete)
            | (InProgress, Failed)
            | (Failed, InProgress) => true,
            (_, NotStarted) => force,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one step attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Complete,
    Failed(String),
}

/// The most recent failure of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub step: usize,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Persisted state of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginProgress {
    #[serde(default)]
    pub status: PluginStatus,
    /// Checksum of the plugin definition the steps were counted against
    #[serde(default)]
    pub definition_checksum: String,
    /// Whether the plugin was ever requested explicitly (not only pulled in
    /// as a dependency)
    #[serde(default)]
    pub requested: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub completed_steps: BTreeSet<usize>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Option values the plugin was installed with
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Destination -> checksum of the content copy-file last wrote
    #[serde(default)]
    pub file_checksums: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureInfo>,
}

impl PluginProgress {
    /// First step index in `0..total` that has not completed.
    pub fn next_step(&self, total: usize) -> Option<usize> {
        (0..total).find(|i| !self.completed_steps.contains(i))
    }

    /// Recorded for a different definition or different option values.
    /// Entries that never went through a run are not stale.
    pub fn is_stale(&self, checksum: &str, options: &BTreeMap<String, String>) -> bool {
        !self.definition_checksum.is_empty()
            && (self.definition_checksum != checksum || &self.options != options)
    }
}

/// Persistent per-target progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub version: u32,
    /// Manifest used by the last run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginProgress>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            version: PROGRESS_VERSION,
            manifest: None,
            updated_at: None,
            plugins: BTreeMap::new(),
        }
    }
}

impl ProgressRecord {
    pub fn get(&self, plugin_id: &str) -> Option<&PluginProgress> {
        self.plugins.get(plugin_id)
    }

    /// Status of a plugin; `not_started` when unknown.
    pub fn status(&self, plugin_id: &str) -> PluginStatus {
        self.get(plugin_id).map(|p| p.status).unwrap_or_default()
    }

    /// Plugins a resume should continue, in id order: everything planned
    /// that has not reached `complete`, including blocked plugins that never
    /// started.
    pub fn pending(&self) -> Vec<&str> {
        self.plugins
            .iter()
            .filter(|(_, p)| p.status != PluginStatus::Complete)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Apply a status change, creating the entry if needed.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] if the state machine forbids the move.
    pub fn transition(&mut self, plugin_id: &str, to: PluginStatus, force: bool) -> Result<()> {
        let entry = self.plugins.entry(plugin_id.to_string()).or_default();
        let from = entry.status;
        if !from.can_transition_to(to, force) {
            return Err(Error::InvalidTransition {
                plugin: plugin_id.to_string(),
                from,
                to,
            });
        }
        tracing::debug!(plugin = plugin_id, %from, %to, "progress transition");
        entry.status = to;
        entry.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// Owns the progress record of one target and persists it.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    record: ProgressRecord,
}

impl ProgressTracker {
    /// Load the record of the target at `root`; empty when absent.
    pub fn load(root: &Path) -> Result<Self> {
        Self::open(TargetLayout::new(root).progress_file())
    }

    /// Load the record at an explicit path; empty when absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let record = match plinth_fs::io::read_text_optional(&path)? {
            None => ProgressRecord::default(),
            Some(content) => {
                let record: ProgressRecord =
                    toml::from_str(&content).map_err(|e| Error::Progress {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                if record.version != PROGRESS_VERSION {
                    return Err(Error::Progress {
                        path,
                        message: format!(
                            "unsupported version {} (expected {PROGRESS_VERSION})",
                            record.version
                        ),
                    });
                }
                record
            }
        };
        Ok(Self { path, record })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn set_manifest(&mut self, manifest: Option<PathBuf>) {
        self.record.manifest = manifest;
    }

    /// Make sure `plugin_id` has an entry for the current definition and
    /// option values.
    ///
    /// Completed steps were rendered with the recorded definition and
    /// options; when either differs the entry is reset first. Returns `true`
    /// when a reset happened.
    pub fn prepare_plugin(
        &mut self,
        plugin_id: &str,
        checksum: &str,
        options: &BTreeMap<String, String>,
        requested: bool,
    ) -> Result<bool> {
        let stale = self
            .record
            .get(plugin_id)
            .is_some_and(|p| p.is_stale(checksum, options));
        if stale {
            tracing::info!(plugin = plugin_id, "plugin definition or options changed, resetting progress");
            self.reset(plugin_id)?;
        }

        let entry = self.record.plugins.entry(plugin_id.to_string()).or_default();
        entry.definition_checksum = checksum.to_string();
        entry.options = options.clone();
        entry.requested |= requested;
        Ok(stale)
    }

    /// Move a plugin to `in_progress` for a new attempt. A plugin already
    /// `in_progress` (interrupted run) simply continues.
    pub fn begin(&mut self, plugin_id: &str) -> Result<()> {
        if self.record.status(plugin_id) != PluginStatus::InProgress {
            self.record
                .transition(plugin_id, PluginStatus::InProgress, false)?;
        }
        if let Some(entry) = self.record.plugins.get_mut(plugin_id) {
            entry.attempts += 1;
        }
        Ok(())
    }

    /// Record the outcome of one step. A failed step fails the plugin.
    pub fn record_step(&mut self, plugin_id: &str, step: usize, status: StepStatus) -> Result<()> {
        match status {
            StepStatus::Complete => {
                let entry = self.record.plugins.entry(plugin_id.to_string()).or_default();
                entry.completed_steps.insert(step);
                entry.updated_at = Some(Utc::now());
                Ok(())
            }
            StepStatus::Failed(message) => {
                self.record
                    .transition(plugin_id, PluginStatus::Failed, false)?;
                if let Some(entry) = self.record.plugins.get_mut(plugin_id) {
                    entry.last_failure = Some(FailureInfo {
                        step,
                        message,
                        at: Utc::now(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Apply a plugin-level status change through the state machine.
    pub fn record_plugin(&mut self, plugin_id: &str, status: PluginStatus) -> Result<()> {
        self.record.transition(plugin_id, status, false)?;
        if status == PluginStatus::Complete {
            if let Some(entry) = self.record.plugins.get_mut(plugin_id) {
                entry.last_failure = None;
            }
        }
        Ok(())
    }

    /// Mark every step of a plugin complete without running it (the plugin
    /// was detected as installed).
    pub fn record_all_steps(&mut self, plugin_id: &str, total: usize) {
        let entry = self.record.plugins.entry(plugin_id.to_string()).or_default();
        entry.completed_steps.extend(0..total);
    }

    /// Forced reset to `not_started`, forgetting completed steps.
    pub fn reset(&mut self, plugin_id: &str) -> Result<()> {
        self.record
            .transition(plugin_id, PluginStatus::NotStarted, true)?;
        if let Some(entry) = self.record.plugins.get_mut(plugin_id) {
            entry.completed_steps.clear();
            entry.last_failure = None;
        }
        Ok(())
    }

    pub fn record_file_checksum(&mut self, plugin_id: &str, destination: &str, checksum: String) {
        let entry = self.record.plugins.entry(plugin_id.to_string()).or_default();
        entry
            .file_checksums
            .insert(destination.to_string(), checksum);
    }

    /// Checksum copy-file last recorded for `destination`, by any plugin.
    pub fn recorded_checksum(&self, destination: &str) -> Option<&str> {
        self.record
            .plugins
            .values()
            .find_map(|p| p.file_checksums.get(destination))
            .map(String::as_str)
    }

    pub fn add_warning(&mut self, plugin_id: &str, warning: impl Into<String>) {
        let entry = self.record.plugins.entry(plugin_id.to_string()).or_default();
        entry.warnings.push(warning.into());
    }

    /// Write the record atomically.
    pub fn persist(&mut self) -> Result<()> {
        self.record.updated_at = Some(Utc::now());
        let content = toml::to_string_pretty(&self.record).map_err(|e| Error::Progress {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        plinth_fs::io::write_text(&self.path, &content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use PluginStatus::*;

    #[rstest]
    #[case(NotStarted, InProgress, false, true)]
    #[case(InProgress, Complete, false, true)]
    #[case(InProgress, Failed, false, true)]
    #[case(Failed, InProgress, false, true)]
    #[case(NotStarted, Complete, false, false)]
    #[case(NotStarted, Failed, false, false)]
    #[case(Complete, InProgress, false, false)]
    #[case(Complete, Failed, false, false)]
    #[case(Failed, Complete, false, false)]
    #[case(Complete, NotStarted, false, false)]
    #[case(Complete, NotStarted, true, true)]
    #[case(Failed, NotStarted, true, true)]
    #[case(InProgress, NotStarted, true, true)]
    fn state_machine(
        #[case] from: PluginStatus,
        #[case] to: PluginStatus,
        #[case] force: bool,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to, force), allowed);
    }

    #[test]
    fn invalid_transition_is_an_error() {
        let mut record = ProgressRecord::default();
        let err = record.transition("foundation", Complete, false).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: NotStarted,
                to: Complete,
                ..
            }
        ));
    }

    #[test]
    fn persisted_record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ProgressTracker::load(dir.path()).unwrap();
        assert!(tracker.record().plugins.is_empty());

        let options = BTreeMap::from([("python_version".to_string(), "3.12".to_string())]);
        tracker
            .prepare_plugin("lang-python", "sha256:aa", &options, true)
            .unwrap();
        tracker.begin("lang-python").unwrap();
        tracker
            .record_step("lang-python", 0, StepStatus::Complete)
            .unwrap();
        tracker
            .record_step("lang-python", 1, StepStatus::Failed("exit 1".to_string()))
            .unwrap();
        tracker.record_file_checksum("lang-python", ".python-version", "sha256:bb".to_string());
        tracker.persist().unwrap();

        let reloaded = ProgressTracker::load(dir.path()).unwrap();
        let entry = reloaded.record().get("lang-python").unwrap();
        assert_eq!(entry.status, Failed);
        assert_eq!(entry.completed_steps, BTreeSet::from([0]));
        assert_eq!(entry.next_step(3), Some(1));
        assert_eq!(entry.options, options);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_failure.as_ref().unwrap().step, 1);
        assert_eq!(reloaded.recorded_checksum(".python-version"), Some("sha256:bb"));
        assert_eq!(reloaded.record().pending(), vec!["lang-python"]);
    }

    #[test]
    fn changed_definition_resets_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ProgressTracker::load(dir.path()).unwrap();
        let options = BTreeMap::new();
        tracker.prepare_plugin("tool", "sha256:v1", &options, false).unwrap();
        tracker.begin("tool").unwrap();
        tracker.record_step("tool", 0, StepStatus::Complete).unwrap();

        let reset = tracker.prepare_plugin("tool", "sha256:v2", &options, false).unwrap();
        assert!(reset);
        let entry = tracker.record().get("tool").unwrap();
        assert_eq!(entry.status, NotStarted);
        assert!(entry.completed_steps.is_empty());
        assert_eq!(entry.definition_checksum, "sha256:v2");
    }

    #[test]
    fn changed_options_reset_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ProgressTracker::load(dir.path()).unwrap();
        let v1 = BTreeMap::from([("v".to_string(), "1".to_string())]);
        let v2 = BTreeMap::from([("v".to_string(), "2".to_string())]);
        tracker.prepare_plugin("tool", "sha256:v1", &v1, true).unwrap();
        tracker.begin("tool").unwrap();
        tracker.record_step("tool", 0, StepStatus::Complete).unwrap();

        assert!(!tracker.prepare_plugin("tool", "sha256:v1", &v1, true).unwrap());
        assert_eq!(tracker.record().get("tool").unwrap().completed_steps, BTreeSet::from([0]));

        assert!(tracker.prepare_plugin("tool", "sha256:v1", &v2, true).unwrap());
        let entry = tracker.record().get("tool").unwrap();
        assert_eq!(entry.status, NotStarted);
        assert!(entry.completed_steps.is_empty());
        assert_eq!(entry.options, v2);
    }

    #[test]
    fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.toml");
        std::fs::write(&path, "version = [").unwrap();
        assert!(matches!(
            ProgressTracker::open(&path).unwrap_err(),
            Error::Progress { .. }
        ));
    }
}
