//! Side-effect-free detection of a plugin's installation state.
//!
//! A plugin is `installed` when every probe passes, `absent` when every probe
//! fails and `partial` otherwise. A probe that cannot be evaluated (permission
//! denied, unparsable config, a command that fails to spawn) is neither pass
//! nor fail: the plugin is reported `partial` with a warning.
//!
//! Plugins without explicit probes are checked against their own file steps.
//! Plugins with nothing to check (only run-command steps) fall back to the
//! progress record.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use plinth_blocks::CommentStyle;
use plinth_manifest::{Format, Manifest, Plugin, Probe, Step};
use regex::Regex;
use serde::Serialize;

use crate::executor::command::{Exit, run_captured};
use crate::progress::{PluginProgress, PluginStatus};
use crate::render;

/// Timeout for `command-version` probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").unwrap());

/// Detected installation state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedState {
    Absent,
    Partial,
    Installed,
}

impl fmt::Display for DetectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Partial => "partial",
            Self::Installed => "installed",
        })
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "message")]
pub enum ProbeOutcome {
    Pass,
    Fail,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub probe: String,
    pub outcome: ProbeOutcome,
}

/// What the state was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionBasis {
    /// Probes declared in the manifest
    Probes,
    /// Checks derived from the plugin's file steps
    Steps,
    /// Nothing to check; the progress record decided
    Progress,
}

/// Detection result for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub state: DetectedState,
    pub basis: DetectionBasis,
    pub probes: Vec<ProbeReport>,
    pub warnings: Vec<String>,
}

/// Evaluates probes against a target repository.
pub struct Detector<'a> {
    root: &'a Path,
    manifest: &'a Manifest,
    probe_timeout: Duration,
}

impl<'a> Detector<'a> {
    pub fn new(root: &'a Path, manifest: &'a Manifest) -> Self {
        Self {
            root,
            manifest,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Detect the state of `plugin` with its resolved option values.
    pub fn detect(
        &self,
        plugin: &Plugin,
        options: &BTreeMap<String, String>,
        progress: Option<&PluginProgress>,
    ) -> Detection {
        let (basis, probes) = if plugin.probes.is_empty() {
            (DetectionBasis::Steps, self.step_checks(plugin, options))
        } else {
            let reports = plugin
                .probes
                .iter()
                .map(|probe| ProbeReport {
                    probe: probe.describe(),
                    outcome: self.evaluate(probe),
                })
                .collect();
            (DetectionBasis::Probes, reports)
        };

        if probes.is_empty() {
            let recorded_complete = progress.is_some_and(|p| {
                p.status == PluginStatus::Complete
                    && p.definition_checksum == plugin.definition_checksum()
            });
            let state = if recorded_complete {
                DetectedState::Installed
            } else {
                DetectedState::Absent
            };
            tracing::debug!(plugin = %plugin.id, %state, "no probes, decided by progress record");
            return Detection {
                state,
                basis: DetectionBasis::Progress,
                probes,
                warnings: Vec::new(),
            };
        }

        let warnings: Vec<String> = probes
            .iter()
            .filter_map(|r| match &r.outcome {
                ProbeOutcome::Error(message) => Some(format!(
                    "plugin '{}': probe {} could not be evaluated: {message}",
                    plugin.id, r.probe
                )),
                _ => None,
            })
            .collect();

        let passed = probes
            .iter()
            .filter(|r| r.outcome == ProbeOutcome::Pass)
            .count();
        let failed = probes
            .iter()
            .filter(|r| r.outcome == ProbeOutcome::Fail)
            .count();

        let mut state = if !warnings.is_empty() {
            DetectedState::Partial
        } else if passed == probes.len() {
            DetectedState::Installed
        } else if failed == probes.len() {
            DetectedState::Absent
        } else {
            DetectedState::Partial
        };

        // Step checks cannot see run-command effects: the files may all be in
        // place while a later command never succeeded.
        if state == DetectedState::Installed
            && basis == DetectionBasis::Steps
            && plugin.steps.iter().any(|s| matches!(s, Step::RunCommand(_)))
            && !progress.is_some_and(|p| {
                p.status == PluginStatus::Complete
                    && p.definition_checksum == plugin.definition_checksum()
            })
        {
            state = DetectedState::Partial;
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        tracing::debug!(plugin = %plugin.id, %state, passed, failed, "detected state");

        Detection {
            state,
            basis,
            probes,
            warnings,
        }
    }

    fn step_checks(&self, plugin: &Plugin, options: &BTreeMap<String, String>) -> Vec<ProbeReport> {
        let values = render::values(plugin, options);
        plugin
            .steps
            .iter()
            .filter_map(|step| {
                let outcome = match step {
                    Step::RunCommand(_) => return None,
                    Step::EnsureDirectory(dir) => self.directory_exists(&dir.path),
                    Step::CopyFile(copy) => {
                        match render::payload(self.manifest, plugin, step, &values) {
                            Ok(Some(expected)) => self.file_equals(&copy.destination, &expected),
                            Ok(None) => ProbeOutcome::Error("step has no payload".to_string()),
                            Err(e) => ProbeOutcome::Error(e.to_string()),
                        }
                    }
                    Step::AppendFile(append) => {
                        match render::payload(self.manifest, plugin, step, &values) {
                            Ok(Some(body)) => self.block_present(
                                &append.destination,
                                &append.block_id(&plugin.id),
                                &body,
                            ),
                            Ok(None) => ProbeOutcome::Error("step has no payload".to_string()),
                            Err(e) => ProbeOutcome::Error(e.to_string()),
                        }
                    }
                };
                Some(ProbeReport {
                    probe: step.describe(),
                    outcome,
                })
            })
            .collect()
    }

    /// Evaluate one declared probe.
    pub fn evaluate(&self, probe: &Probe) -> ProbeOutcome {
        let outcome = match probe {
            Probe::FileExists { path } => self.path_exists(path),
            Probe::FileContains { path, marker } => self.file_contains(path, marker),
            Probe::CommandVersion {
                command,
                args,
                expect,
            } => self.command_version(command, args, expect),
            Probe::ConfigKey { path, key } => self.config_key(path, key),
        };
        tracing::debug!(probe = %probe.describe(), ?outcome, "probe evaluated");
        outcome
    }

    fn read(&self, path: &str) -> Result<Option<String>, String> {
        let native = plinth_fs::confine(self.root, path).map_err(|e| e.to_string())?;
        plinth_fs::io::read_text_optional(&native).map_err(|e| e.to_string())
    }

    fn path_exists(&self, path: &str) -> ProbeOutcome {
        let native = match plinth_fs::confine(self.root, path) {
            Ok(native) => native,
            Err(e) => return ProbeOutcome::Error(e.to_string()),
        };
        match std::fs::symlink_metadata(&native) {
            Ok(_) => ProbeOutcome::Pass,
            Err(e) if e.kind() == ErrorKind::NotFound => ProbeOutcome::Fail,
            Err(e) => ProbeOutcome::Error(format!("{}: {e}", native.display())),
        }
    }

    fn directory_exists(&self, path: &str) -> ProbeOutcome {
        let native = match plinth_fs::confine(self.root, path) {
            Ok(native) => native,
            Err(e) => return ProbeOutcome::Error(e.to_string()),
        };
        match std::fs::metadata(&native) {
            Ok(meta) if meta.is_dir() => ProbeOutcome::Pass,
            Ok(_) => ProbeOutcome::Fail,
            Err(e) if e.kind() == ErrorKind::NotFound => ProbeOutcome::Fail,
            Err(e) => ProbeOutcome::Error(format!("{}: {e}", native.display())),
        }
    }

    fn file_contains(&self, path: &str, marker: &str) -> ProbeOutcome {
        match self.read(path) {
            Ok(Some(content)) if content.contains(marker) => ProbeOutcome::Pass,
            Ok(_) => ProbeOutcome::Fail,
            Err(message) => ProbeOutcome::Error(message),
        }
    }

    fn file_equals(&self, path: &str, expected: &str) -> ProbeOutcome {
        match self.read(path) {
            Ok(Some(content)) if content == expected => ProbeOutcome::Pass,
            Ok(_) => ProbeOutcome::Fail,
            Err(message) => ProbeOutcome::Error(message),
        }
    }

    fn block_present(&self, path: &str, block_id: &str, body: &str) -> ProbeOutcome {
        let Some(style) = CommentStyle::for_path(path) else {
            return ProbeOutcome::Error(format!("'{path}' has no comment syntax"));
        };
        match self.read(path) {
            Ok(Some(content)) => match plinth_blocks::upsert_block(&content, style, block_id, body) {
                Ok(upsert) if !upsert.changed => ProbeOutcome::Pass,
                Ok(_) => ProbeOutcome::Fail,
                Err(e) => ProbeOutcome::Error(format!("{path}: {e}")),
            },
            Ok(None) => ProbeOutcome::Fail,
            Err(message) => ProbeOutcome::Error(message),
        }
    }

    fn command_version(&self, command: &str, args: &[String], expect: &str) -> ProbeOutcome {
        let requirement = match semver::VersionReq::parse(expect) {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::Error(format!("invalid requirement '{expect}': {e}")),
        };

        let mut cmd = Command::new(command);
        cmd.args(args).current_dir(self.root);
        let captured = match run_captured(cmd, self.probe_timeout) {
            Ok(captured) => captured,
            Err(e) if e.kind() == ErrorKind::NotFound => return ProbeOutcome::Fail,
            Err(e) => return ProbeOutcome::Error(format!("failed to run '{command}': {e}")),
        };
        if captured.exit == Exit::TimedOut {
            return ProbeOutcome::Error(format!("'{command}' timed out"));
        }

        match parse_version(&captured.stdout).or_else(|| parse_version(&captured.stderr)) {
            Some(version) if requirement.matches(&version) => ProbeOutcome::Pass,
            Some(version) => {
                tracing::debug!(command, %version, %requirement, "version does not match");
                ProbeOutcome::Fail
            }
            None => ProbeOutcome::Fail,
        }
    }

    fn config_key(&self, path: &str, key: &str) -> ProbeOutcome {
        let content = match self.read(path) {
            Ok(Some(content)) => content,
            Ok(None) => return ProbeOutcome::Fail,
            Err(message) => return ProbeOutcome::Error(message),
        };
        let Some(format) = Format::from_path(Path::new(path)) else {
            return ProbeOutcome::Error(format!("'{path}' is not a TOML, YAML or JSON file"));
        };
        let value = match format.parse_value(&content) {
            Ok(value) => value,
            Err(message) => return ProbeOutcome::Error(format!("{path}: {message}")),
        };
        if lookup(&value, key).is_some() {
            ProbeOutcome::Pass
        } else {
            ProbeOutcome::Fail
        }
    }
}

/// First `x.y[.z]` token in `output`.
pub fn parse_version(output: &str) -> Option<semver::Version> {
    let caps = VERSION_TOKEN.captures(output)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    Some(semver::Version::new(part(1)?, part(2)?, part(3).unwrap_or(0)))
}

/// Follow a dotted key through objects and arrays.
fn lookup<'v>(value: &'v serde_json::Value, key: &str) -> Option<&'v serde_json::Value> {
    key.split('.').try_fold(value, |current, segment| match current {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
