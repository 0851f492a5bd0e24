//! Block parsing for managed blocks.

use crate::error::{Error, Result};
use crate::marker::CommentStyle;

/// A parsed block with its id, content, and position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The id named in the markers.
    pub id: String,
    /// The lines between the markers, joined with `\n`, without a trailing newline.
    pub content: String,
    /// Byte offset where the opening marker line starts.
    pub start: usize,
    /// Byte offset just past the closing marker line (including its newline, if any).
    pub end: usize,
    /// 1-based line number of the opening marker.
    pub start_line: usize,
    /// 1-based line number of the closing marker.
    pub end_line: usize,
}

/// Parses all blocks written in `style` from `content`, in order of appearance.
///
/// # Errors
///
/// Returns [`Error::UnterminatedBlock`] when an opening marker has no
/// matching closing marker. Callers must not append a second copy of a block
/// whose first copy is damaged.
///
/// # Example
/// ```
/// use plinth_blocks::{CommentStyle, parse_blocks};
///
/// let content = "build/\n# >>> plinth:lang-python >>>\n.venv/\n# <<< plinth:lang-python <<<\n";
/// let blocks = parse_blocks(content, CommentStyle::Hash).unwrap();
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].id, "lang-python");
/// assert_eq!(blocks[0].content, ".venv/");
/// ```
pub fn parse_blocks(content: &str, style: CommentStyle) -> Result<Vec<Block>> {
    let lines: Vec<(usize, &str)> = line_offsets(content);
    let mut blocks = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let (start, line) = lines[idx];
        let Some(id) = style.parse_open(line) else {
            idx += 1;
            continue;
        };

        let close = style.close_marker(id);
        let close_idx = lines[idx + 1..]
            .iter()
            .position(|(_, l)| l.trim() == close)
            .map(|p| idx + 1 + p)
            .ok_or_else(|| Error::UnterminatedBlock {
                id: id.to_string(),
                line: idx + 1,
            })?;

        let body: Vec<&str> = lines[idx + 1..close_idx]
            .iter()
            .map(|(_, l)| l.trim_end_matches(['\n', '\r']))
            .collect();
        let (close_start, close_line) = lines[close_idx];

        blocks.push(Block {
            id: id.to_string(),
            content: body.join("\n"),
            start,
            end: close_start + close_line.len(),
            start_line: idx + 1,
            end_line: close_idx + 1,
        });
        idx = close_idx + 1;
    }

    Ok(blocks)
}

/// Finds the block with `id`, if present.
pub fn find_block(content: &str, style: CommentStyle, id: &str) -> Result<Option<Block>> {
    Ok(parse_blocks(content, style)?
        .into_iter()
        .find(|block| block.id == id))
}

/// Checks whether a block with `id` exists in `content`.
pub fn has_block(content: &str, style: CommentStyle, id: &str) -> Result<bool> {
    Ok(find_block(content, style, id)?.is_some())
}

/// Split into lines keeping terminators, paired with their byte offsets.
fn line_offsets(content: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    content
        .split_inclusive('\n')
        .map(|line| {
            let start = offset;
            offset += line.len();
            (start, line)
        })
        .collect()
}
