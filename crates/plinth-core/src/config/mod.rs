//! Layered settings
//!
//! Settings are loaded and merged from these sources (later sources override
//! earlier):
//!
//! 1. **Global** - `<config_dir>/plinth/config.toml`
//! 2. **Repository** - `<target>/.plinth/config.toml`
//! 3. **Local overrides** - `<target>/.plinth/config.local.toml`
//!
//! Command-line flags override the merged result.
//!
//! ```toml
//! manifest = "tooling/plinth.yaml"
//! step_timeout_secs = 900
//! lock_stale_secs = 3600
//! jobs = 4
//! ```

mod resolver;
mod settings;

pub use resolver::SettingsResolver;
pub use settings::{DEFAULT_LOCK_STALE_SECS, DEFAULT_STEP_TIMEOUT_SECS, Settings, SettingsLayer};
