//! Error types for the watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while watching and coordinating reindexes.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Watched root not found.
    #[error("watch root not found: {0}")]
    RootNotFound(String),

    /// Watched root is not a directory.
    #[error("watch root is not a directory: {0}")]
    NotADirectory(String),

    /// Invalid include or ignore pattern.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// Indexer error surfaced during a reconcile sweep.
    #[error("indexer error: {0}")]
    Indexer(#[from] semdex_indexer::IndexerError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
