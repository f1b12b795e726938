//! Error types for search.

use thiserror::Error;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while searching.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The embedding or vector store capability failed.
    #[error("store error: {0}")]
    Store(#[from] semdex_store::StoreError),
}
