//! Repo-relative path normalization and confinement

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Join the non-empty, non-`.` segments of a forward-slash path.
fn collapse_segments(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Validate that `path` is a repository-relative path and return its
/// normalized form.
///
/// Rejected: empty paths, absolute paths (including Windows drive and UNC
/// prefixes) and any `..` component. The returned string never has a
/// leading `./` or a trailing slash.
pub fn validate_repo_relative(path: &str) -> std::result::Result<String, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("path must not be empty".to_string());
    }
    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || unified.as_bytes().get(1) == Some(&b':') {
        return Err("path must be relative to the repository root".to_string());
    }
    for component in Path::new(&unified).components() {
        match component {
            Component::ParentDir => {
                return Err("path must not contain '..'".to_string());
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the repository root".to_string());
            }
            _ => {}
        }
    }
    let normalized = collapse_segments(&unified);
    if normalized.is_empty() {
        return Err("path must name something below the repository root".to_string());
    }
    Ok(normalized)
}

/// Resolve a repository-relative path against `root`.
///
/// # Errors
///
/// Returns [`Error::PathEscapesRoot`] if `relative` is not a valid
/// repository-relative path.
pub fn confine(root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = validate_repo_relative(relative).map_err(|reason| Error::PathEscapesRoot {
        path: relative.to_string(),
        reason,
    })?;
    Ok(root.join(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_drops_empty_and_dot_segments() {
        assert_eq!(collapse_segments("a//b/./c/"), "a/b/c");
        assert_eq!(collapse_segments("./Makefile"), "Makefile");
        assert_eq!(collapse_segments("./"), "");
    }

    #[test]
    fn validate_repo_relative_rejects_escapes() {
        assert!(validate_repo_relative("../etc/passwd").is_err());
        assert!(validate_repo_relative("a/../../b").is_err());
        assert!(validate_repo_relative("/etc/passwd").is_err());
        assert!(validate_repo_relative("C:\\Windows").is_err());
        assert!(validate_repo_relative("").is_err());
        assert!(validate_repo_relative(".").is_err());
    }

    #[test]
    fn validate_repo_relative_normalizes() {
        assert_eq!(validate_repo_relative("./docs/").unwrap(), "docs");
        assert_eq!(
            validate_repo_relative(".github\\workflows\\ci.yml").unwrap(),
            ".github/workflows/ci.yml"
        );
    }

    #[test]
    fn confine_joins_under_root() {
        let root = Path::new("/work/repo");
        assert_eq!(
            confine(root, "./src/main.rs").unwrap(),
            PathBuf::from("/work/repo/src/main.rs")
        );
        assert!(matches!(
            confine(root, "../x"),
            Err(Error::PathEscapesRoot { .. })
        ));
    }
}
