//! # semdex-indexer
//!
//! Incremental document indexing for the semdex pipeline: fingerprint
//! bookkeeping, chunk upserts, shrink pruning, and directory walks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Indexer                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Document ──► Chunker ──► EmbeddingProvider ──► VectorStore    │
//! │      │                                             ▲            │
//! │      ▼                                             │            │
//! │  IndexState (fingerprint, chunk count)  keyed per-id locks     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod document;
pub mod error;
pub mod indexer;
pub mod state;

pub use document::{Document, DocumentMetadata, fingerprint};
pub use error::{IndexerError, Result};
pub use indexer::{IndexOutcome, IndexSummary, Indexer, RetryConfig, entry_id};
pub use state::{DocumentRecord, IndexState};
