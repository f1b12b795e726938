//! Error types for the engine facade.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid chunking configuration.
    #[error(transparent)]
    Chunking(#[from] semdex_chunking::ChunkingError),

    /// Indexing failed.
    #[error(transparent)]
    Indexer(#[from] semdex_indexer::IndexerError),

    /// Search failed.
    #[error(transparent)]
    Search(#[from] semdex_search::SearchError),

    /// Watching or coordinating failed.
    #[error(transparent)]
    Watcher(#[from] semdex_watcher::WatcherError),
}
