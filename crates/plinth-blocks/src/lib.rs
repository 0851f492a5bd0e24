//! Managed blocks for plinth.
//!
//! `append-file` steps never rewrite a whole file. They own one block inside
//! it, delimited by begin/end marker comments in the file's own comment
//! syntax, and bring exactly that block up to date:
//!
//! ```text
//! # >>> plinth:std-security >>>
//! .env
//! *.pem
//! # <<< plinth:std-security <<<
//! ```
//!
//! Re-applying the same body is a no-op; a different body replaces the old
//! block in place.

pub mod error;
pub mod marker;
pub mod parser;
pub mod writer;

pub use error::{Error, Result};
pub use marker::{CommentStyle, is_valid_block_id};
pub use parser::{Block, find_block, has_block, parse_blocks};
pub use writer::{Upsert, format_block, upsert_block};
