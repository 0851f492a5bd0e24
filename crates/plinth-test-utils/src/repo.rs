//! [`TestRepo`]: a temporary target repository.

use std::fs;
use std::path::{Path, PathBuf};

use plinth_manifest::{DEFAULT_MANIFEST_FILENAME, Manifest};
use tempfile::TempDir;

/// A temporary target directory with helpers for setup and assertions.
///
/// # Example
///
/// ```rust,no_run
/// use plinth_test_utils::{TestRepo, catalog};
///
/// let repo = TestRepo::with_manifest(catalog::STANDARD);
/// repo.write_file(".plinth-foundation", "installed\n");
/// repo.assert_file_contains(".plinth-foundation", "installed");
/// ```
pub struct TestRepo {
    temp_dir: TempDir,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a target whose `plinth.toml` holds `catalog`.
    pub fn with_manifest(catalog: &str) -> Self {
        let repo = Self::new();
        repo.write_file(DEFAULT_MANIFEST_FILENAME, catalog);
        repo
    }

    /// Root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path(DEFAULT_MANIFEST_FILENAME)
    }

    /// Load the target's `plinth.toml`.
    pub fn manifest(&self) -> Manifest {
        Manifest::load(self.manifest_path()).unwrap()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn read_file(&self, relative: &str) -> String {
        let path = self.path(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Could not read file {}: {e}", path.display()))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Every file below the root except plinth's own state, sorted, as
    /// `(relative path, content)`. Used to assert that nothing changed.
    pub fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        collect(self.root(), self.root(), &mut files);
        files.sort();
        files
    }

    /// Assert that `relative` exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    /// Assert that `relative` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(
            !path.exists(),
            "Expected file NOT to exist: {}",
            path.display()
        );
    }

    /// Assert that the file at `relative` contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, relative: &str, content: &str) {
        let actual = self.read_file(relative);
        assert!(
            actual.contains(content),
            "File {relative} does not contain expected content.\nExpected: {content}\nActual: {actual}"
        );
    }
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().is_some_and(|n| n == ".plinth") {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            files.push((relative, fs::read(&path).unwrap()));
        }
    }
}
