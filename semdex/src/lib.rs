//! # semdex
//!
//! Semantic document indexing, retrieval, and token-budgeted context
//! assembly. Documents are chunked on natural boundaries, embedded, and
//! upserted into a vector store; queries return ranked (optionally
//! document-grouped) chunk matches that the context assembler packs
//! into a hard token budget. A watch session keeps the index live as
//! files change.
//!
//! ## Quick start
//!
//! ```no_run
//! use semdex::Engine;
//!
//! # async fn example() -> semdex::Result<()> {
//! let engine = Engine::with_defaults().await?;
//! engine
//!     .index_directory(std::path::Path::new("./docs"), "**/*.md")
//!     .await?;
//!
//! let window = engine.query("how does retry backoff work?", 8).await?;
//! println!("{}", window.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, EngineStats, WatchSession};
pub use error::{EngineError, Result};

// Re-export the component crates' primary types so most callers only
// depend on `semdex`.
pub use semdex_chunking::{
    Chunk, Chunker, ChunkerConfig, HeuristicTokenizer, TokenCounter, WordTokenizer,
};
pub use semdex_indexer::{
    Document, DocumentRecord, IndexOutcome, IndexState, IndexSummary, Indexer, RetryConfig,
};
pub use semdex_search::{
    AssemblerConfig, ContextAssembler, ContextOrder, ContextWindow, GroupedResult, SearchResult,
    Searcher, SearcherConfig,
};
pub use semdex_store::{
    EmbeddingProvider, EntryFilter, EntryMetadata, EntryRecord, HashProvider, MemoryVectorStore,
    OpenAiProvider, VectorStore,
};
pub use semdex_watcher::{
    ChangeEvent, ChangeKind, CoordinatorConfig, ReindexCoordinator, WatchBridge, WatchConfig,
};
