//! Semantic search with result grouping.
//!
//! The searcher embeds a query, pulls ranked chunk matches from the
//! vector store, and optionally collapses chunks of the same document
//! into one group keyed by the best-scoring chunk. Because grouping
//! shrinks the result count, the raw query over-fetches by a
//! configurable factor.

use std::collections::HashMap;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use semdex_store::{EmbeddingProvider, EntryFilter, ScoredEntry, VectorStore};

use crate::error::Result;

/// Configuration for the searcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Raw-candidate multiplier applied when grouping by document.
    ///
    /// Collapsing chunks into document groups eats into `k`; fetching
    /// `k * overfetch_factor` raw matches keeps groups filled on most
    /// corpora. Small corpora may still return fewer than `k` groups.
    pub overfetch_factor: usize,

    /// Minimum similarity score to keep a match.
    pub min_score: f32,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: 4,
            min_score: -1.0,
        }
    }
}

/// A ranked chunk match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Index entry identifier.
    pub entry_id: String,

    /// Owning document identifier.
    pub document_id: String,

    /// Chunk position within the document.
    pub chunk_index: usize,

    /// Similarity score (higher is better).
    pub score: f32,

    /// Chunk text.
    pub text: String,

    /// Token cost of the chunk.
    pub token_count: usize,

    /// Document tags copied onto the entry.
    pub tags: HashMap<String, String>,

    /// The query that produced this result.
    pub query: String,
}

impl SearchResult {
    fn from_entry(entry: ScoredEntry, query: &str) -> Self {
        Self {
            entry_id: entry.id,
            document_id: entry.metadata.document_id,
            chunk_index: entry.metadata.chunk_index,
            score: entry.score,
            text: entry.text,
            token_count: entry.metadata.token_count,
            tags: entry.metadata.tags,
            query: query.to_string(),
        }
    }
}

/// Chunks of one document collapsed into a single ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedResult {
    /// Owning document identifier.
    pub document_id: String,

    /// The best-scoring chunk of the group.
    pub best: SearchResult,

    /// Entry ids of every contributing chunk, best first.
    pub supporting: Vec<String>,
}

/// Issues queries against the store and ranks the results.
pub struct Searcher {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: SearcherConfig,
}

impl Searcher {
    /// Create a searcher with the default configuration.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            provider,
            store,
            config: SearcherConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: SearcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Search for the `k` best chunk matches.
    ///
    /// Ranking is by score descending; ties break by chunk index
    /// (earlier position preferred), then entry id, for determinism.
    /// Empty queries and empty corpora return an empty vec.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<SearchResult>> {
        let raw = self.raw_search(query, k, filter).await?;
        Ok(raw.into_iter().take(k).collect())
    }

    /// Search and collapse chunks of the same document into one group.
    ///
    /// Groups are ranked by their best chunk's score; each group keeps
    /// the ids of all contributing chunks for later expansion.
    pub async fn search_grouped(
        &self,
        query: &str,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<GroupedResult>> {
        let fetch = k.saturating_mul(self.config.overfetch_factor.max(1));
        let raw = self.raw_search(query, fetch, filter).await?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, GroupedResult> = HashMap::new();
        for result in raw {
            match groups.get_mut(&result.document_id) {
                Some(group) => group.supporting.push(result.entry_id),
                None => {
                    order.push(result.document_id.clone());
                    groups.insert(
                        result.document_id.clone(),
                        GroupedResult {
                            document_id: result.document_id.clone(),
                            supporting: vec![result.entry_id.clone()],
                            best: result,
                        },
                    );
                }
            }
        }

        debug!(
            raw_groups = order.len(),
            requested = k,
            "grouped search results"
        );
        Ok(order
            .into_iter()
            .take(k)
            .filter_map(|id| groups.remove(&id))
            .collect())
    }

    async fn raw_search(
        &self,
        query: &str,
        fetch: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || fetch == 0 {
            return Ok(Vec::new());
        }

        let vector = self.provider.embed(query).await?;
        let entries = self.store.query(&vector, fetch, filter).await?;

        let mut results: Vec<SearchResult> = entries
            .into_iter()
            .filter(|e| e.score >= self.config.min_score)
            .map(|e| SearchResult::from_entry(e, query))
            .collect();
        results.sort_by(|a, b| {
            OrderedFloat(b.score)
                .cmp(&OrderedFloat(a.score))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use semdex_store::{
        EmbeddingProvider, EntryMetadata, EntryRecord, MemoryVectorStore, StoreError,
    };

    /// Maps fixed query strings to fixed vectors.
    struct StaticProvider {
        map: HashMap<String, Vec<f32>>,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> semdex_store::Result<Vec<f32>> {
            self.map
                .get(text)
                .cloned()
                .ok_or_else(|| StoreError::Embedding(format!("no vector for {text:?}")))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn record(document_id: &str, chunk_index: usize, embedding: Vec<f32>) -> EntryRecord {
        EntryRecord {
            id: format!("{document_id}#chunk{chunk_index}"),
            embedding,
            text: format!("{document_id} chunk {chunk_index}"),
            metadata: EntryMetadata {
                document_id: document_id.to_string(),
                chunk_index,
                span_start: 0,
                span_end: 0,
                token_count: 3,
                tags: HashMap::new(),
            },
        }
    }

    async fn searcher_over(records: Vec<EntryRecord>) -> (Searcher, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        for r in records {
            store.upsert(r).await.unwrap();
        }
        let provider = Arc::new(StaticProvider {
            map: HashMap::from([("query".to_string(), vec![1.0, 0.0])]),
        });
        (Searcher::new(provider, store.clone()), store)
    }

    /// Vector at a fixed cosine similarity to [1, 0].
    fn at_similarity(score: f32) -> Vec<f32> {
        vec![score, (1.0 - score * score).sqrt()]
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let (searcher, _) = searcher_over(vec![record("x", 0, vec![1.0, 0.0])]).await;
        let results = searcher.search("   ", 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty() {
        let (searcher, _) = searcher_over(vec![]).await;
        let results = searcher.search("query", 5, None).await.unwrap();
        assert!(results.is_empty());
        let grouped = searcher.search_grouped("query", 5, None).await.unwrap();
        assert!(grouped.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_score() {
        let (searcher, _) = searcher_over(vec![
            record("a", 0, at_similarity(0.5)),
            record("b", 0, at_similarity(0.9)),
            record("c", 0, at_similarity(0.7)),
        ])
        .await;

        let results = searcher.search("query", 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document_id, "b");
        assert_eq!(results[1].document_id, "c");
    }

    #[tokio::test]
    async fn ties_break_by_chunk_index() {
        let (searcher, _) = searcher_over(vec![
            record("a", 2, at_similarity(0.8)),
            record("a", 0, at_similarity(0.8)),
            record("a", 1, at_similarity(0.8)),
        ])
        .await;

        let results = searcher.search("query", 3, None).await.unwrap();
        let indices: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn grouped_search_collapses_documents() {
        // X has five chunks all scoring 0.8; Y's best chunk outscores
        // them but its second chunk scores lowest of all.
        let mut records: Vec<EntryRecord> = (0..5)
            .map(|i| record("x", i, at_similarity(0.8)))
            .collect();
        records.push(record("y", 0, at_similarity(0.95)));
        records.push(record("y", 1, at_similarity(0.1)));

        let (searcher, _) = searcher_over(records).await;
        let groups = searcher.search_grouped("query", 2, None).await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].document_id, "y");
        assert_eq!(groups[1].document_id, "x");
        assert!((groups[0].best.score - 0.95).abs() < 1e-3);

        // Every contributing chunk id is retained for expansion.
        assert_eq!(groups[0].supporting.len(), 2);
        assert_eq!(groups[1].supporting.len(), 5);
        assert_eq!(groups[0].supporting[0], "y#chunk0");
    }

    #[tokio::test]
    async fn grouped_search_tolerates_small_corpora() {
        let (searcher, _) = searcher_over(vec![
            record("only", 0, at_similarity(0.9)),
            record("only", 1, at_similarity(0.4)),
        ])
        .await;

        let groups = searcher.search_grouped("query", 5, None).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].supporting.len(), 2);
    }

    #[tokio::test]
    async fn min_score_filters_matches() {
        let (mut searcher, _) = searcher_over(vec![
            record("a", 0, at_similarity(0.9)),
            record("b", 0, at_similarity(0.2)),
        ])
        .await;
        searcher.config.min_score = 0.5;

        let results = searcher.search("query", 5, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "a");
    }
}
