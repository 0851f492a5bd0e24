//! Core orchestration layer for plinth
//!
//! This crate turns a validated plugin catalog into changes on a target
//! repository:
//!
//! - **Resolution**: transitive dependency closure and a deterministic
//!   installation order
//! - **Detection**: probes (or the plugin's own steps) decide whether a plugin
//!   is absent, partial or installed
//! - **Planning**: per-plugin `skip`/`apply` actions, resume points and
//!   conflict checks, all before anything is mutated
//! - **Execution**: idempotent steps with progress persisted after each one
//!
//! # Architecture
//!
//! ```text
//!                    plinth-cli
//!                        |
//!                   plinth-core
//!                        |
//!        +---------------+---------------+
//!        |               |               |
//!   plinth-fs      plinth-blocks   plinth-manifest
//! ```
//!
//! # Example
//!
//! ```no_run
//! use plinth_core::{InstallRequest, Orchestrator, Settings};
//! use plinth_manifest::Manifest;
//!
//! fn example() -> plinth_core::Result<()> {
//!     let manifest = Manifest::load("plinth.toml")?;
//!     let orchestrator = Orchestrator::new(".", manifest, Settings::default())?;
//!     let report = orchestrator.install(&InstallRequest::new(["lang-python"]))?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conflict;
pub mod detector;
pub mod error;
pub mod executor;
pub mod layout;
pub mod orchestrator;
pub mod plan;
pub mod progress;
mod render;
pub mod resolver;

pub use config::{Settings, SettingsLayer, SettingsResolver};
pub use conflict::{Collision, Conflict};
pub use detector::{DetectedState, Detection, DetectionBasis, Detector, ProbeOutcome, ProbeReport};
pub use error::{Error, MissingPlugin, Result};
pub use executor::{CancelFlag, Executor, OutcomeKind, PluginOutcome, RunResult};
pub use layout::{STATE_DIR, TargetLayout};
pub use orchestrator::{InstallRequest, Orchestrator, ResumeRequest, RunReport, StatusEntry};
pub use plan::{InstallationPlan, PlanAction, PlanEntry};
pub use progress::{
    FailureInfo, PROGRESS_VERSION, PluginProgress, PluginStatus, ProgressRecord, ProgressTracker,
    StepStatus,
};
pub use resolver::{DependencyGraph, resolve};
