//! Token-budgeted context assembly.
//!
//! Walks ranked search results and greedily packs chunks into a context
//! window without ever exceeding the token budget. Inclusion is
//! all-or-nothing per chunk: a chunk that does not fit is skipped and
//! the walk continues, so a smaller lower-ranked chunk can still use
//! the remaining budget.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use semdex_chunking::TokenCounter;

use crate::searcher::SearchResult;

/// Output ordering of the included chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrder {
    /// Ranking order (most relevant first).
    Relevance,

    /// Coherent reading order: grouped by document, position ascending.
    Document,
}

/// Configuration for the context assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Maximum chunks included from a single document.
    pub per_document_cap: usize,

    /// Output ordering policy.
    pub order: ContextOrder,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            per_document_cap: 3,
            order: ContextOrder::Relevance,
        }
    }
}

/// A chunk selected into a context window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludedChunk {
    /// Index entry identifier.
    pub entry_id: String,

    /// Owning document identifier.
    pub document_id: String,

    /// Chunk position within the document.
    pub chunk_index: usize,

    /// Similarity score the chunk was ranked with.
    pub score: f32,

    /// Chunk text.
    pub text: String,

    /// Tokens charged for this inclusion (chunk + citation header).
    pub cost_tokens: usize,
}

/// An assembled, token-bounded context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    /// Included chunks, in output order.
    pub chunks: Vec<IncludedChunk>,

    /// Rendered context string.
    pub content: String,

    /// Total tokens charged against the budget.
    pub total_tokens: usize,

    /// The configured budget.
    pub budget: usize,

    /// Whether at least one candidate was dropped for lack of budget.
    pub truncated: bool,
}

/// Assembles ranked results into a bounded context string.
pub struct ContextAssembler {
    counter: Arc<dyn TokenCounter>,
    config: AssemblerConfig,
}

impl ContextAssembler {
    /// Create an assembler with the default configuration.
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            config: AssemblerConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    /// Citation header emitted before each included chunk.
    fn header(result: &SearchResult) -> String {
        format!("### {}\n", result.document_id)
    }

    /// Greedily select chunks from `results` (already in ranking order)
    /// into a window of at most `budget` tokens.
    ///
    /// Deterministic: identical results, budget, and configuration
    /// always produce a byte-identical window.
    pub fn assemble(&self, results: &[SearchResult], budget: usize) -> ContextWindow {
        let mut included: Vec<IncludedChunk> = Vec::new();
        let mut per_document: HashMap<&str, usize> = HashMap::new();
        let mut total_tokens = 0;
        let mut truncated = false;

        for result in results {
            let seen = per_document
                .get(result.document_id.as_str())
                .copied()
                .unwrap_or(0);
            if seen >= self.config.per_document_cap {
                continue;
            }

            let header = Self::header(result);
            let cost = result.token_count + self.counter.count(&header);
            if total_tokens + cost > budget {
                truncated = true;
                continue;
            }

            total_tokens += cost;
            *per_document.entry(result.document_id.as_str()).or_insert(0) += 1;
            included.push(IncludedChunk {
                entry_id: result.entry_id.clone(),
                document_id: result.document_id.clone(),
                chunk_index: result.chunk_index,
                score: result.score,
                text: result.text.clone(),
                cost_tokens: cost,
            });
        }

        if self.config.order == ContextOrder::Document {
            included.sort_by(|a, b| {
                a.document_id
                    .cmp(&b.document_id)
                    .then_with(|| a.chunk_index.cmp(&b.chunk_index))
            });
        }

        let mut content = String::new();
        for chunk in &included {
            content.push_str(&format!("### {}\n", chunk.document_id));
            content.push_str(&chunk.text);
            if !chunk.text.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
        }

        debug!(
            included = included.len(),
            total_tokens, budget, truncated, "assembled context window"
        );
        ContextWindow {
            chunks: included,
            content,
            total_tokens,
            budget,
            truncated,
        }
    }
}
