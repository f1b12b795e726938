//! # semdex-chunking
//!
//! Token counting and token-budgeted chunking for the semdex pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Chunking                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  TokenCounter ──► Chunker ──► Chunks (lazy iterator)           │
//! │       │               │            │                            │
//! │       ▼               ▼            ▼                            │
//! │  Heuristic/Word/BPE  atom packing  Chunk {span, tokens}        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod chunker;
pub mod error;
pub mod tokenizer;

pub use chunker::{Chunk, Chunker, ChunkerConfig, Chunks};
pub use error::{ChunkingError, Result};
#[cfg(feature = "tiktoken")]
pub use tokenizer::BpeTokenizer;
pub use tokenizer::{HeuristicTokenizer, TokenCounter, WordTokenizer};
