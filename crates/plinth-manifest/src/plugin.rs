//! Plugin model: categories, options, steps and presence probes.
//!
//! # Example TOML
//!
//! ```toml
//! [plugins.lang-python]
//! category = "language"
//! dependencies = ["foundation"]
//! declared_outputs = [".python-version", ".gitignore", "makefiles/python.mk"]
//! declared_namespace_tokens = ["make:lint-python", "make:test-python"]
//!
//! [plugins.lang-python.options.python_version]
//! allowed = ["3.11", "3.12", "3.13"]
//! default = "3.12"
//! ask_user = true
//!
//! [[plugins.lang-python.steps]]
//! type = "copy-file"
//! args = { destination = ".python-version", content = "{{python_version}}\n" }
//!
//! [[plugins.lang-python.steps]]
//! type = "run-command"
//! args = { command = "uv sync", timeout_secs = 300 }
//!
//! [[plugins.lang-python.probes]]
//! type = "file-contains"
//! path = ".python-version"
//! marker = "3."
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Plugin category. Variant order is the resolver's tie-break rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Foundation,
    Language,
    Infrastructure,
    Standard,
    Application,
}

impl Category {
    /// Tie-break rank: foundation (0) < language < infrastructure < standard < application (4).
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::Language => "language",
            Self::Infrastructure => "infrastructure",
            Self::Standard => "standard",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configurable plugin option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSpec {
    /// Permitted values. Empty means any value is accepted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    /// Value used when nothing else supplies one.
    pub default: String,
    /// Whether an interactive run should ask the user.
    #[serde(default)]
    pub ask_user: bool,
    /// Prompt text shown when asking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OptionSpec {
    /// Whether `value` is acceptable for this option.
    pub fn accepts(&self, value: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == value)
    }
}

/// Where a file step's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Path relative to the manifest directory.
    Source(&'a str),
    /// Literal content embedded in the manifest.
    Inline(&'a str),
}

/// `copy-file`: make `destination` hold the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyFile {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Render `{{option}}` placeholders inside the payload.
    #[serde(default)]
    pub template: bool,
}

/// `append-file`: own one markered block inside `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppendFile {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Block name, appended to the plugin id in the markers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[serde(default)]
    pub template: bool,
}

impl AppendFile {
    /// Marker id of the block this step owns.
    pub fn block_id(&self, plugin_id: &str) -> String {
        match &self.block {
            Some(block) => format!("{plugin_id}:{block}"),
            None => plugin_id.to_string(),
        }
    }
}

/// `run-command`: execute a declared shell step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCommand {
    pub command: String,
    /// Working directory relative to the repository root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Overrides the run's default per-step timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `ensure-directory`: create `path` if absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnsureDirectory {
    pub path: String,
}

/// One declarative installation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
    CopyFile(CopyFile),
    AppendFile(AppendFile),
    RunCommand(RunCommand),
    EnsureDirectory(EnsureDirectory),
}

impl Step {
    /// Manifest name of the step type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CopyFile(_) => "copy-file",
            Self::AppendFile(_) => "append-file",
            Self::RunCommand(_) => "run-command",
            Self::EnsureDirectory(_) => "ensure-directory",
        }
    }

    /// The repo-relative path this step writes, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::CopyFile(s) => Some(&s.destination),
            Self::AppendFile(s) => Some(&s.destination),
            Self::EnsureDirectory(s) => Some(&s.path),
            Self::RunCommand(_) => None,
        }
    }

    /// Payload of a file step. `None` for non-file steps or invalid
    /// combinations (validation rejects those).
    pub fn payload(&self) -> Option<Payload<'_>> {
        let (source, content) = match self {
            Self::CopyFile(s) => (&s.source, &s.content),
            Self::AppendFile(s) => (&s.source, &s.content),
            _ => return None,
        };
        match (source, content) {
            (Some(src), None) => Some(Payload::Source(src)),
            (None, Some(text)) => Some(Payload::Inline(text)),
            _ => None,
        }
    }

    /// The file payload is rendered before it is written.
    pub fn is_templated(&self) -> bool {
        match self {
            Self::CopyFile(s) => s.template,
            Self::AppendFile(s) => s.template,
            _ => false,
        }
    }

    /// Short human description used in logs and progress messages.
    pub fn describe(&self) -> String {
        match self {
            Self::CopyFile(s) => format!("copy-file {}", s.destination),
            Self::AppendFile(s) => format!("append-file {}", s.destination),
            Self::RunCommand(s) => format!("run-command `{}`", s.command),
            Self::EnsureDirectory(s) => format!("ensure-directory {}", s.path),
        }
    }
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

/// A side-effect-free presence check used by the state detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Probe {
    /// The path exists.
    FileExists { path: String },
    /// The file exists and contains `marker`.
    FileContains { path: String, marker: String },
    /// `command args...` runs and reports a version matching `expect`.
    CommandVersion {
        command: String,
        #[serde(default = "default_version_args")]
        args: Vec<String>,
        /// Semver requirement, e.g. `">=3.11"`.
        expect: String,
    },
    /// A TOML/YAML/JSON file contains the dotted `key`.
    ConfigKey { path: String, key: String },
}

impl Probe {
    /// Repo-relative path inspected by this probe, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::FileExists { path } | Self::FileContains { path, .. } => Some(path),
            Self::ConfigKey { path, .. } => Some(path),
            Self::CommandVersion { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::FileExists { path } => format!("file-exists {path}"),
            Self::FileContains { path, marker } => format!("file-contains {path} ({marker:?})"),
            Self::CommandVersion { command, expect, .. } => {
                format!("command-version {command} {expect}")
            }
            Self::ConfigKey { path, key } => format!("config-key {path}#{key}"),
        }
    }
}

/// A unit of installable tooling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plugin {
    /// Filled from the manifest key.
    #[serde(skip)]
    pub id: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub declared_outputs: BTreeSet<String>,
    #[serde(default)]
    pub declared_namespace_tokens: BTreeSet<String>,
}

impl Plugin {
    /// Deterministic fingerprint of the plugin definition.
    ///
    /// Progress recorded against one definition is not reused for another:
    /// step indices are only meaningful for the steps they were counted on.
    pub fn definition_checksum(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        plinth_fs::compute_content_checksum(&format!("{}\n{}", self.id, body))
    }
}
