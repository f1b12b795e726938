//! Error types for chunking.

use thiserror::Error;

/// Result type alias for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkingError>;

/// Errors that can occur while configuring or running the chunker.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid chunking parameters. Fatal; never retried.
    #[error("invalid chunking configuration: {0}")]
    Config(String),

    /// The tokenizer backend could not be constructed.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}
