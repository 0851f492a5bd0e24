use std::fmt;
use std::path::PathBuf;

/// A single manifest rule violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("manifest version {found} is not supported (expected 1)")]
    UnsupportedVersion { found: u32 },

    #[error("invalid plugin id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("plugin '{plugin}' depends on unknown plugin '{dependency}'")]
    UnknownDependency { plugin: String, dependency: String },

    #[error("plugin '{plugin}' depends on itself")]
    SelfDependency { plugin: String },

    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("plugin '{plugin}' option '{option}': default '{default}' is not one of [{}]", .allowed.join(", "))]
    DefaultNotAllowed {
        plugin: String,
        option: String,
        default: String,
        allowed: Vec<String>,
    },

    #[error("plugin '{plugin}' {location}: invalid path '{path}': {reason}")]
    InvalidPath {
        plugin: String,
        location: String,
        path: String,
        reason: String,
    },

    #[error("plugin '{plugin}' step {step} writes '{path}' which is not in declared_outputs")]
    UndeclaredOutput {
        plugin: String,
        step: usize,
        path: String,
    },

    #[error("plugin '{plugin}' step {step}: {reason}")]
    InvalidStep {
        plugin: String,
        step: usize,
        reason: String,
    },

    #[error("plugin '{plugin}' has two append-file steps for block '{block}' in '{destination}'")]
    DuplicateBlock {
        plugin: String,
        destination: String,
        block: String,
    },

    #[error("plugin '{plugin}' step {step} uses unknown placeholder '{{{{{name}}}}}'")]
    UnknownPlaceholder {
        plugin: String,
        step: usize,
        name: String,
    },

    #[error("plugin '{plugin}' probe {probe}: invalid version requirement '{requirement}': {reason}")]
    InvalidVersionRequirement {
        plugin: String,
        probe: usize,
        requirement: String,
        reason: String,
    },
}

/// Every violation found in one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Where the manifest came from (path or `<inline>`).
    pub source: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "manifest {} has {} violation(s)",
            self.source,
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("manifest not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported manifest format '{extension}' for {path} (expected toml, yaml, yml or json)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to parse manifest {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("failed to read payload '{path}' for plugin '{plugin}'")]
    Payload {
        plugin: String,
        path: String,
        #[source]
        source: plinth_fs::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fs(#[from] plinth_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
