//! Manifest store for plinth.
//!
//! This crate loads the plugin catalog (TOML, YAML or JSON), validates it
//! exhaustively and resolves per-plugin option values.

pub mod error;
pub mod manifest;
pub mod options;
pub mod plugin;
pub mod template;
pub mod validation;

pub use error::{Error, Result, ValidationError, Violation};
pub use manifest::{DEFAULT_MANIFEST_FILENAME, Format, MANIFEST_VERSION, Manifest};
pub use options::{
    OptionAssignment, OptionProblem, Prompter, check_assignments, parse_assignments,
    resolve_options,
};
pub use plugin::{
    AppendFile, Category, CopyFile, EnsureDirectory, OptionSpec, Payload, Plugin, Probe,
    RunCommand, Step,
};
pub use validation::{dependency_cycles, validate_id};
