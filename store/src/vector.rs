//! The vector store capability.
//!
//! The indexing and search layers talk to persistent vector storage
//! through [`VectorStore`] only, so alternate backends can be
//! substituted without touching the engine — including the in-memory
//! implementation used in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::Result;

/// Metadata persisted alongside each entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Identifier of the owning document.
    pub document_id: String,

    /// Position of the chunk within its document.
    pub chunk_index: usize,

    /// Byte offset of the chunk's start in the source text.
    pub span_start: usize,

    /// Byte offset of the chunk's end in the source text.
    pub span_end: usize,

    /// Token cost of the chunk.
    pub token_count: usize,

    /// Free-form document tags (filename, extension, ...).
    pub tags: HashMap<String, String>,
}

/// The persisted, queryable record for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Entry identifier, derived from document id + chunk index so that
    /// re-upserting the same chunk overwrites rather than duplicates.
    pub id: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// The chunk text.
    pub text: String,

    /// Entry metadata.
    pub metadata: EntryMetadata,
}

/// A ranked match returned by [`VectorStore::query`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntry {
    /// Entry identifier.
    pub id: String,

    /// Similarity score (higher is better).
    pub score: f32,

    /// The chunk text.
    pub text: String,

    /// Entry metadata.
    pub metadata: EntryMetadata,
}

/// Equality filter applied at query time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Restrict matches to a single document.
    pub document_id: Option<String>,

    /// Require these tag key/value pairs to match exactly.
    pub tags: HashMap<String, String>,
}

impl EntryFilter {
    /// Filter to one document id.
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            tags: HashMap::new(),
        }
    }

    /// Require a tag to equal a value.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Whether `metadata` satisfies this filter.
    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        if let Some(ref document_id) = self.document_id {
            if &metadata.document_id != document_id {
                return false;
            }
        }
        self.tags
            .iter()
            .all(|(k, v)| metadata.tags.get(k) == Some(v))
    }
}

/// Narrow capability interface over persistent vector storage.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite an entry.
    async fn upsert(&self, record: EntryRecord) -> Result<()>;

    /// Delete one entry. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every entry belonging to a document. Returns the count.
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;

    /// Return the `k` entries most similar to `vector`, best first.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<ScoredEntry>>;
}
