//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;

use crate::{Error, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers observe either the previous
/// content or the new content, never a partial write. The temp file lives in
/// the destination directory to keep the rename on one filesystem.
pub fn write_atomic(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let native_path = path.as_ref();

    if let Some(parent) = native_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }

    let temp_path = temp_sibling(native_path);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: native_path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native_path.to_path_buf(),
    })?;
    drop(temp_file);

    if let Err(e) = fs::rename(&temp_path, native_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(native_path, e));
    }

    Ok(())
}

/// Unique temp file path next to `path`.
///
/// The name carries the process id and a per-process counter so concurrent
/// writers (threads or processes) never share a temp file.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        seq
    ))
}

/// Write text content to a file atomically.
pub fn write_text(path: impl AsRef<Path>, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Read text content from a file.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let native_path = path.as_ref();
    fs::read_to_string(native_path).map_err(|e| Error::io(native_path, e))
}

/// Read text content, returning `None` when the file does not exist.
///
/// Every other failure (permission denied, invalid UTF-8, ...) is an error:
/// callers rely on the distinction between "absent" and "unreadable".
pub fn read_text_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let native_path = path.as_ref();
    match fs::read_to_string(native_path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(native_path, e)),
    }
}

/// Create a directory and its parents.
///
/// Returns `true` if the directory was created, `false` if it already existed.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<bool> {
    let native_path = path.as_ref();
    if native_path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(native_path).map_err(|e| Error::io(native_path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");

        write_atomic(&path, b"payload").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "payload");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn read_text_optional_distinguishes_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_text_optional(dir.path().join("nope")).unwrap().is_none());

        fs::write(dir.path().join("yes"), "x").unwrap();
        assert_eq!(
            read_text_optional(dir.path().join("yes")).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn ensure_dir_reports_creation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b");
        assert!(ensure_dir(&target).unwrap());
        assert!(!ensure_dir(&target).unwrap());
    }
}
