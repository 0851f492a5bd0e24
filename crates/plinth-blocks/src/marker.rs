//! Begin/end marker syntax for managed blocks.
//!
//! A managed block is wrapped in a pair of comment lines in the target
//! file's own comment syntax:
//!
//! ```text
//! # >>> plinth:lang-python >>>
//! .venv/
//! # <<< plinth:lang-python <<<
//! ```

use crate::error::{Error, Result};

/// Marker tag shared by every block this crate writes.
pub const TAG: &str = "plinth";

/// Line-comment syntax used to render block markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `# ...` (shell, Makefile, YAML, TOML, Python, ignore files)
    Hash,
    /// `// ...` (C-family, Rust, Go, JavaScript)
    Slash,
    /// `<!-- ... -->` (Markdown, HTML, XML)
    Html,
    /// `-- ...` (SQL, Lua, Haskell)
    DoubleDash,
}

impl CommentStyle {
    /// Pick the comment style for a destination path.
    ///
    /// Returns `None` for formats without line comments (JSON), which
    /// cannot carry managed blocks.
    pub fn for_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let extension = match file_name.rfind('.') {
            Some(idx) if idx > 0 => file_name[idx + 1..].to_ascii_lowercase(),
            _ => String::new(),
        };

        match extension.as_str() {
            "json" | "ipynb" => None,
            "md" | "markdown" | "html" | "htm" | "xml" | "svg" | "vue" => Some(Self::Html),
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" | "rs" | "go" | "c" | "h" | "cc"
            | "cpp" | "hpp" | "java" | "kt" | "kts" | "swift" | "scala" | "dart" | "proto"
            | "jsonc" | "json5" => Some(Self::Slash),
            "sql" | "lua" | "hs" => Some(Self::DoubleDash),
            _ => Some(Self::Hash),
        }
    }

    fn wrap(self, inner: &str) -> String {
        match self {
            Self::Hash => format!("# {inner}"),
            Self::Slash => format!("// {inner}"),
            Self::Html => format!("<!-- {inner} -->"),
            Self::DoubleDash => format!("-- {inner}"),
        }
    }

    /// Opening marker line for block `id`.
    pub fn open_marker(self, id: &str) -> String {
        self.wrap(&format!(">>> {TAG}:{id} >>>"))
    }

    /// Closing marker line for block `id`.
    pub fn close_marker(self, id: &str) -> String {
        self.wrap(&format!("<<< {TAG}:{id} <<<"))
    }

    /// Extract the block id if `line` is an opening marker in this style.
    pub(crate) fn parse_open(self, line: &str) -> Option<&str> {
        let (prefix, suffix) = match self {
            Self::Hash => ("# >>> ", " >>>"),
            Self::Slash => ("// >>> ", " >>>"),
            Self::Html => ("<!-- >>> ", " >>> -->"),
            Self::DoubleDash => ("-- >>> ", " >>>"),
        };
        let rest = line.trim().strip_prefix(prefix)?.strip_suffix(suffix)?;
        let id = rest.strip_prefix(TAG)?.strip_prefix(':')?;
        is_valid_block_id(id).then_some(id)
    }
}

/// Whether `id` may be used as a block id.
pub fn is_valid_block_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

pub(crate) fn validate_block_id(id: &str) -> Result<()> {
    if is_valid_block_id(id) {
        Ok(())
    } else {
        Err(Error::InvalidBlockId { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_follows_extension() {
        assert_eq!(CommentStyle::for_path(".gitignore"), Some(CommentStyle::Hash));
        assert_eq!(CommentStyle::for_path("Makefile"), Some(CommentStyle::Hash));
        assert_eq!(CommentStyle::for_path("docs/README.md"), Some(CommentStyle::Html));
        assert_eq!(CommentStyle::for_path("src/main.RS"), Some(CommentStyle::Slash));
        assert_eq!(CommentStyle::for_path("schema.sql"), Some(CommentStyle::DoubleDash));
        assert_eq!(CommentStyle::for_path("package.json"), None);
    }

    #[test]
    fn markers_round_trip_through_parse_open() {
        for style in [
            CommentStyle::Hash,
            CommentStyle::Slash,
            CommentStyle::Html,
            CommentStyle::DoubleDash,
        ] {
            let open = style.open_marker("lint:targets");
            assert_eq!(style.parse_open(&open), Some("lint:targets"));
            assert_eq!(style.parse_open(&style.close_marker("lint")), None);
        }
    }

    #[test]
    fn block_id_charset() {
        assert!(is_valid_block_id("std-security:gitignore"));
        assert!(!is_valid_block_id("has space"));
        assert!(!is_valid_block_id(""));
    }
}
