//! Incremental document indexing.
//!
//! The indexer chunks a document, embeds each chunk, and upserts the
//! resulting entries into the vector store. Bookkeeping in
//! [`IndexState`] makes reindexing incremental: unchanged fingerprints
//! short-circuit with zero store writes, and shrinking documents have
//! their stale trailing entries pruned. Indexing of the same document id
//! is serialized through a keyed lock; different ids proceed in
//! parallel.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use semdex_chunking::{Chunk, Chunker};
use semdex_store::{EmbeddingProvider, EntryMetadata, EntryRecord, VectorStore};

use crate::document::Document;
use crate::error::{IndexerError, Result};
use crate::state::{DocumentRecord, IndexState};

/// Entry identifier for one chunk of a document.
///
/// Deterministic, so re-upserting the same chunk overwrites rather than
/// duplicates, and ids never collide across a document's chunks.
pub fn entry_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}#chunk{chunk_index}")
}

/// Include-pattern matcher for directory walks.
///
/// A leading `**/` is also tried stripped, so `**/*.md` matches `a.md`
/// at the root of the walk as well as in subdirectories.
struct IncludeMatcher {
    full: glob::Pattern,
    rootless: Option<glob::Pattern>,
}

impl IncludeMatcher {
    fn new(pattern: &str) -> std::result::Result<Self, glob::PatternError> {
        Ok(Self {
            full: glob::Pattern::new(pattern)?,
            rootless: pattern
                .strip_prefix("**/")
                .map(glob::Pattern::new)
                .transpose()?,
        })
    }

    fn matches(&self, rel: &Path) -> bool {
        self.full.matches_path(rel)
            || self
                .rootless
                .as_ref()
                .is_some_and(|p| p.matches_path(rel))
    }
}

/// Outcome of indexing a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    /// The document was not previously indexed.
    Inserted,

    /// The document was re-indexed with new content.
    Updated,

    /// Fingerprint unchanged; no store operations were issued.
    Unchanged,
}

/// Aggregated result of a directory indexing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Documents indexed for the first time.
    pub inserted: usize,

    /// Documents re-indexed with changed content.
    pub updated: usize,

    /// Documents skipped because their fingerprint matched.
    pub unchanged: usize,

    /// Documents that failed to read or index.
    pub failed: usize,

    /// Per-path failure descriptions.
    pub errors: Vec<(std::path::PathBuf, String)>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl IndexSummary {
    /// Total documents visited.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.failed
    }

    fn tally(&mut self, outcome: IndexOutcome) {
        match outcome {
            IndexOutcome::Inserted => self.inserted += 1,
            IndexOutcome::Updated => self.updated += 1,
            IndexOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Retry policy for transient store failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: usize,

    /// Base backoff, doubled per retry.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Orchestrates chunking and store updates for documents.
pub struct Indexer {
    chunker: Chunker,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    state: RwLock<IndexState>,

    /// Per-document-id locks serializing same-id indexing.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    retry: RetryConfig,
    cancel: CancellationToken,
}

impl Indexer {
    /// Create an indexer over the given capabilities and bookkeeping.
    pub fn new(
        chunker: Chunker,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        state: IndexState,
    ) -> Self {
        Self {
            chunker,
            provider,
            store,
            state: RwLock::new(state),
            locks: Mutex::new(HashMap::new()),
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Token that cancels long-running batch operations between
    /// documents (an in-flight document always finishes).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bookkeeping record for a document, if tracked.
    pub async fn record(&self, document_id: &str) -> Option<DocumentRecord> {
        self.state.read().await.get(document_id).cloned()
    }

    /// All tracked document ids.
    pub async fn tracked(&self) -> Vec<String> {
        self.state.read().await.ids()
    }

    async fn lock_for(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Index one document, returning what happened.
    ///
    /// Unchanged content (matching fingerprint, complete prior pass) is
    /// a no-op. Otherwise every chunk is embedded and upserted, then any
    /// entries beyond the new chunk count are pruned so a shrinking
    /// document leaves no stale trailing entries.
    pub async fn index_document(&self, doc: &Document) -> Result<IndexOutcome> {
        let lock = self.lock_for(&doc.id).await;
        let _guard = lock.lock().await;

        let previous = self.state.read().await.get(&doc.id).cloned();
        if let Some(ref prev) = previous {
            if prev.fingerprint == doc.fingerprint && prev.complete {
                debug!(document_id = %doc.id, "fingerprint unchanged, skipping");
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let chunks: Vec<Chunk> = self.chunker.chunk(&doc.content).collect();
        let tags = doc.entry_tags();
        let mut complete = true;

        for chunk in &chunks {
            let embedding = match self.provider.embed(&chunk.text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(
                        document_id = %doc.id,
                        chunk_index = chunk.index,
                        error = %e,
                        "embedding failed, skipping chunk"
                    );
                    complete = false;
                    continue;
                }
            };

            let record = EntryRecord {
                id: entry_id(&doc.id, chunk.index),
                embedding,
                text: chunk.text.clone(),
                metadata: EntryMetadata {
                    document_id: doc.id.clone(),
                    chunk_index: chunk.index,
                    span_start: chunk.span.start,
                    span_end: chunk.span.end,
                    token_count: chunk.token_count,
                    tags: tags.clone(),
                },
            };
            self.upsert_with_retry(record).await?;
        }

        // Prune stale trailing entries left over from a longer revision.
        if let Some(ref prev) = previous {
            for stale_index in chunks.len()..prev.chunk_count {
                self.delete_with_retry(&entry_id(&doc.id, stale_index))
                    .await?;
            }
        }

        {
            let mut state = self.state.write().await;
            state.set(
                doc.id.clone(),
                DocumentRecord {
                    fingerprint: doc.fingerprint.clone(),
                    chunk_count: chunks.len(),
                    complete,
                },
            );
            state.persist().await?;
        }

        let outcome = if previous.is_some() {
            IndexOutcome::Updated
        } else {
            IndexOutcome::Inserted
        };
        info!(
            document_id = %doc.id,
            chunks = chunks.len(),
            complete,
            ?outcome,
            "indexed document"
        );
        Ok(outcome)
    }

    /// Read a file and index it.
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<IndexOutcome> {
        let doc = Document::from_file(path)?;
        self.index_document(&doc).await
    }

    /// Remove a document's entries and bookkeeping. Returns the number
    /// of entries deleted.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let lock = self.lock_for(document_id).await;
        let _guard = lock.lock().await;

        let removed = self.store.delete_by_document(document_id).await?;
        {
            let mut state = self.state.write().await;
            state.remove(document_id);
            state.persist().await?;
        }
        info!(document_id, removed, "removed document");
        Ok(removed)
    }

    /// Cascade removal of every tracked document under a path prefix.
    /// Returns the number of documents removed.
    pub async fn remove_documents_under(&self, prefix: &str) -> Result<usize> {
        let ids = self.state.read().await.ids_under(prefix);
        let mut removed = 0;
        for id in ids {
            self.remove_document(&id).await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Index every file under `root` matching `pattern`.
    ///
    /// Individual failures are recorded in the summary, never fatal to
    /// the batch. Cancellation is honored between documents.
    pub async fn index_directory(&self, root: &Path, pattern: &str) -> Result<IndexSummary> {
        let matcher = IncludeMatcher::new(pattern)
            .map_err(|e| IndexerError::InvalidPattern(format!("{pattern}: {e}")))?;

        let start = std::time::Instant::now();
        let mut summary = IndexSummary::default();

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if self.cancel.is_cancelled() {
                info!("indexing cancelled, stopping before next document");
                break;
            }

            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path);
            if !matcher.matches(rel) {
                continue;
            }

            let result = match Document::from_file(path) {
                Ok(doc) => self.index_document(&doc).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(outcome) => summary.tally(outcome),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to index file");
                    summary.failed += 1;
                    summary.errors.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            failed = summary.failed,
            "directory indexing pass finished"
        );
        Ok(summary)
    }

    async fn upsert_with_retry(&self, record: EntryRecord) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.store.upsert(record.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff * 2u32.pow(attempt as u32 - 1);
                    warn!(id = %record.id, error = %e, attempt, "transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn delete_with_retry(&self, id: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.store.delete(id).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.backoff * 2u32.pow(attempt as u32 - 1);
                    warn!(id, error = %e, attempt, "transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
