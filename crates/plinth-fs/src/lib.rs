//! Filesystem primitives for plinth
//!
//! Provides repo-relative path confinement, atomic writes, content checksums
//! and the advisory run lock that guards a target repository.

pub mod checksum;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;

pub use checksum::{compute_bytes_checksum, compute_content_checksum};
pub use error::{Error, Result};
pub use lock::{LockInfo, RunLock};
pub use path::{confine, validate_repo_relative};
