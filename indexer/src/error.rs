//! Error types for the indexer.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for indexing operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Errors that can occur while indexing documents.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Invalid glob pattern for directory indexing.
    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    /// A document's content could not be read.
    #[error("failed to read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chunking failed.
    #[error("chunking error: {0}")]
    Chunking(#[from] semdex_chunking::ChunkingError),

    /// A store operation failed after exhausting retries.
    #[error("store error: {0}")]
    Store(#[from] semdex_store::StoreError),

    /// Bookkeeping serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
