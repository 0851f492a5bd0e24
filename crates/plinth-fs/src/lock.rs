//! Advisory run lock for a target repository
//!
//! A run lock is a small TOML file naming the process that owns the target
//! for the duration of one orchestrator run. It is created atomically
//! (write a private temp file, then hard-link it into place, which fails if
//! the lock already exists) and removed when the [`RunLock`] guard drops.
//!
//! An existing lock is considered stale when it is older than the caller's
//! staleness timeout, or when it was written on this host by a process that
//! no longer exists. Stale locks are taken over with a warning; live locks
//! fail fast with [`Error::LockHeld`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Contents of a run lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process id of the owning run
    pub pid: u32,
    /// Unique id of the owning run
    pub run_id: String,
    /// Host the owning run executes on
    pub host: String,
    /// When the lock was taken
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    /// Describe the current process as a lock owner.
    pub fn current(run_id: impl Into<String>) -> Self {
        Self {
            pid: std::process::id(),
            run_id: run_id.into(),
            host: current_host(),
            started_at: Utc::now(),
        }
    }

    fn is_stale(&self, stale_after: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.started_at);
        let expired = age
            .to_std()
            .map(|age| age > stale_after)
            .unwrap_or(false);
        expired || (self.host == current_host() && !is_process_alive(self.pid))
    }
}

/// Guard holding the run lock of a target. The lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    info: LockInfo,
}

impl RunLock {
    /// Acquire the lock at `path` for the run identified by `run_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::LockHeld`] if a live, non-stale run owns the lock
    /// - [`Error::LockCorrupt`] if the existing lock file cannot be parsed
    /// - [`Error::Io`] on filesystem failures
    pub fn acquire(path: &Path, run_id: &str, stale_after: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let info = LockInfo::current(run_id);
        let content = toml::to_string_pretty(&info).map_err(|e| Error::LockCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // One takeover attempt: if a stale lock reappears after removal,
        // another run won the race and we report contention.
        for attempt in 0..2 {
            match Self::try_create(path, &content) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), run_id, "acquired run lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        info,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let existing = Self::read(path)?;
                    if attempt == 0 && existing.is_stale(stale_after) {
                        tracing::warn!(
                            pid = existing.pid,
                            host = %existing.host,
                            started_at = %existing.started_at,
                            "taking over stale run lock"
                        );
                        match fs::remove_file(path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(Error::io(path, e)),
                        }
                    }
                    return Err(Error::LockHeld {
                        path: path.to_path_buf(),
                        pid: existing.pid,
                        host: existing.host,
                        started_at: existing.started_at,
                    });
                }
                Err(e) => return Err(Error::io(path, e)),
            }
        }

        let existing = Self::read(path)?;
        Err(Error::LockHeld {
            path: path.to_path_buf(),
            pid: existing.pid,
            host: existing.host,
            started_at: existing.started_at,
        })
    }

    /// Read the owner of an existing lock without acquiring it.
    pub fn read(path: &Path) -> Result<LockInfo> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&content).map_err(|e| Error::LockCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Owner information written into the lock file.
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_create(path: &Path, content: &str) -> std::io::Result<()> {
        let temp_path = crate::io::temp_sibling(path);
        fs::write(&temp_path, content)?;
        let linked = fs::hard_link(&temp_path, path);
        let _ = fs::remove_file(&temp_path);
        linked
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Only remove the file if it still names this run.
        match Self::read(&self.path) {
            Ok(current) if current.run_id == self.info.run_id => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
                }
            }
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "run lock was taken over by another run");
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "run lock already gone");
            }
        }
    }
}

fn current_host() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Check if a process is still alive by PID
fn is_process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    #[cfg(unix)]
    {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(true)
    }
    #[cfg(windows)]
    {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH"])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(true)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        true
    }
}
