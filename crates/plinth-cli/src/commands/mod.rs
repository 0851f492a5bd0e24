//! Command implementations for plinth-cli

pub mod completions;
pub mod install;
pub mod report;
pub mod status;
pub mod validate;

pub use completions::run_completions;
pub use install::{run_install, run_resume};
pub use status::run_status;
pub use validate::run_validate_manifest;

/// How a command finished when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Everything requested is in place.
    Done,
    /// Some plugins failed, were blocked or were interrupted.
    NeedsAttention,
}
