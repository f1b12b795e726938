//! In-memory vector store.
//!
//! The reference [`VectorStore`] implementation: cosine similarity over
//! a `RwLock`-guarded map, optional JSON persistence, and write-op
//! counters that let tests assert idempotence ("unchanged" reindexes
//! must issue zero writes).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::similarity::{cosine_similarity, normalize};
use crate::vector::{EntryFilter, EntryRecord, ScoredEntry, VectorStore};

/// In-memory [`VectorStore`] backed by cosine similarity.
pub struct MemoryVectorStore {
    entries: Arc<RwLock<HashMap<String, EntryRecord>>>,

    /// Dimension fixed by the first upsert.
    dimension: Arc<RwLock<Option<usize>>>,

    /// Write operations performed (upserts + deletes).
    write_ops: AtomicU64,
}

impl MemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            dimension: Arc::new(RwLock::new(None)),
            write_ops: AtomicU64::new(0),
        }
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Total write operations performed so far.
    pub fn write_ops(&self) -> u64 {
        self.write_ops.load(Ordering::Relaxed)
    }

    /// All entry ids for one document, sorted by chunk index.
    pub async fn document_entries(&self, document_id: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<(usize, String)> = entries
            .values()
            .filter(|e| e.metadata.document_id == document_id)
            .map(|e| (e.metadata.chunk_index, e.id.clone()))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("cleared vector store");
    }

    /// Persist all entries as JSON to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let entries = self.entries.read().await;
        let records: Vec<&EntryRecord> = entries.values().collect();
        let content = serde_json::to_string(&records)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        debug!(count = records.len(), path = %path.display(), "saved vector store");
        Ok(())
    }

    /// Load entries from a JSON file produced by [`save`](Self::save).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).await?;
        let records: Vec<EntryRecord> = serde_json::from_str(&content)?;

        let store = Self::new();
        {
            let mut entries = store.entries.write().await;
            let mut dimension = store.dimension.write().await;
            for record in records {
                if let Some(expected) = *dimension {
                    if record.embedding.len() != expected {
                        return Err(StoreError::DimensionMismatch {
                            expected,
                            actual: record.embedding.len(),
                        });
                    }
                } else {
                    *dimension = Some(record.embedding.len());
                }
                entries.insert(record.id.clone(), record);
            }
            info!(count = entries.len(), "loaded vector store");
        }
        Ok(store)
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, mut record: EntryRecord) -> Result<()> {
        {
            let mut dimension = self.dimension.write().await;
            match *dimension {
                Some(expected) if record.embedding.len() != expected => {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: record.embedding.len(),
                    });
                }
                Some(_) => {}
                None => *dimension = Some(record.embedding.len()),
            }
        }

        normalize(&mut record.embedding);
        self.entries
            .write()
            .await
            .insert(record.id.clone(), record);
        self.write_ops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.entries.write().await.remove(id).is_some();
        if removed {
            self.write_ops.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.metadata.document_id != document_id);
        let removed = before - entries.len();
        if removed > 0 {
            self.write_ops.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(document_id, removed, "deleted document entries");
        }
        Ok(removed)
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<ScoredEntry>> {
        let mut query = vector.to_vec();
        normalize(&mut query);

        let entries = self.entries.read().await;
        let mut scored: Vec<(OrderedFloat<f32>, &EntryRecord)> = Vec::new();
        for record in entries.values() {
            if let Some(filter) = filter {
                if !filter.matches(&record.metadata) {
                    continue;
                }
            }
            let score = cosine_similarity(&query, &record.embedding)?;
            scored.push((OrderedFloat(score), record));
        }

        // Score descending; id ascending keeps equal scores deterministic.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| ScoredEntry {
                id: record.id.clone(),
                score: score.0,
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }
}
