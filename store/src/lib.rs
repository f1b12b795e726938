//! # semdex-store
//!
//! Embedding and vector store capabilities consumed by the semdex
//! engine. The hard parts of the pipeline treat both as opaque
//! dependencies behind narrow traits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Store layer                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorStore               │
//! │       │                                  │                      │
//! │       ▼                                  ▼                      │
//! │  OpenAI / Hash                   MemoryVectorStore             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod provider;
pub mod similarity;
pub mod vector;

pub use error::{Result, StoreError};
pub use memory::MemoryVectorStore;
pub use provider::{EmbeddingProvider, HashProvider, OpenAiProvider};
pub use similarity::{cosine_similarity, normalize};
pub use vector::{EntryFilter, EntryMetadata, EntryRecord, ScoredEntry, VectorStore};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
