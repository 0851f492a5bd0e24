//! Error types for plinth-blocks

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid block id '{id}': only ASCII alphanumerics and '-', '_', '.', ':' are allowed")]
    InvalidBlockId { id: String },

    #[error("block '{id}' opened on line {line} has no closing marker")]
    UnterminatedBlock { id: String, line: usize },
}
