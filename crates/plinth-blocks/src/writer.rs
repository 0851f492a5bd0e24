//! Block writing for managed blocks.
//!
//! Only upsert is provided: blocks are created or brought up to date, never
//! removed. Everything outside the block is preserved byte for byte.

use crate::error::Result;
use crate::marker::{CommentStyle, validate_block_id};
use crate::parser::find_block;

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    /// The full new file content.
    pub content: String,
    /// Whether `content` differs from the input.
    pub changed: bool,
}

/// Renders a complete block (markers, body, trailing newline).
pub fn format_block(style: CommentStyle, id: &str, body: &str) -> String {
    let body = normalize_body(body);
    if body.is_empty() {
        format!("{}\n{}\n", style.open_marker(id), style.close_marker(id))
    } else {
        format!(
            "{}\n{}\n{}\n",
            style.open_marker(id),
            body,
            style.close_marker(id)
        )
    }
}

/// Inserts or replaces the block `id` so that it contains exactly `body`.
///
/// - block present with identical body: no change
/// - block present with another body: replaced in place
/// - block absent: appended at the end, separated by a blank line
///
/// # Errors
///
/// Fails if `id` is not a valid block id or the content holds an
/// unterminated block.
///
/// # Example
/// ```
/// use plinth_blocks::{CommentStyle, upsert_block};
///
/// let first = upsert_block("target/\n", CommentStyle::Hash, "lang-rust", "Cargo.lock").unwrap();
/// assert!(first.changed);
/// let second = upsert_block(&first.content, CommentStyle::Hash, "lang-rust", "Cargo.lock").unwrap();
/// assert!(!second.changed);
/// ```
pub fn upsert_block(content: &str, style: CommentStyle, id: &str, body: &str) -> Result<Upsert> {
    validate_block_id(id)?;
    let wanted = normalize_body(body);

    if let Some(existing) = find_block(content, style, id)? {
        if existing.content == wanted {
            return Ok(Upsert {
                content: content.to_string(),
                changed: false,
            });
        }

        let mut updated = String::with_capacity(content.len() + body.len());
        updated.push_str(&content[..existing.start]);
        let block = format_block(style, id, &wanted);
        if existing.end == content.len() && !content.ends_with('\n') {
            updated.push_str(block.trim_end_matches('\n'));
        } else {
            updated.push_str(&block);
        }
        updated.push_str(&content[existing.end..]);
        return Ok(Upsert {
            changed: updated != content,
            content: updated,
        });
    }

    let mut updated = content.to_string();
    if !updated.is_empty() {
        if !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push('\n');
    }
    updated.push_str(&format_block(style, id, &wanted));
    Ok(Upsert {
        content: updated,
        changed: true,
    })
}

/// Block bodies are compared without trailing newlines or carriage returns.
fn normalize_body(body: &str) -> String {
    body.lines().collect::<Vec<_>>().join("\n").trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_into_empty() {
        let result = upsert_block("", CommentStyle::Hash, "abc", "content").unwrap();
        assert!(result.changed);
        assert_eq!(
            result.content,
            "# >>> plinth:abc >>>\ncontent\n# <<< plinth:abc <<<\n"
        );
    }

    #[test]
    fn test_insert_after_existing_text() {
        let result = upsert_block("existing", CommentStyle::Hash, "abc", "content").unwrap();
        assert!(result.content.starts_with("existing\n\n# >>> plinth:abc >>>"));
    }

    #[test]
    fn test_update_replaces_in_place() {
        let content = "head\n# >>> plinth:abc >>>\nold\n# <<< plinth:abc <<<\ntail\n";
        let result = upsert_block(content, CommentStyle::Hash, "abc", "new\n").unwrap();
        assert!(result.changed);
        assert_eq!(
            result.content,
            "head\n# >>> plinth:abc >>>\nnew\n# <<< plinth:abc <<<\ntail\n"
        );
    }

    #[test]
    fn test_identical_body_is_noop() {
        let content = "# >>> plinth:abc >>>\nsame\n# <<< plinth:abc <<<";
        let result = upsert_block(content, CommentStyle::Hash, "abc", "same\n\n").unwrap();
        assert!(!result.changed);
        assert_eq!(result.content, content);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!(upsert_block("", CommentStyle::Hash, "bad id", "x").is_err());
    }
}
