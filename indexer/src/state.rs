//! Fingerprint and chunk-count bookkeeping.
//!
//! [`IndexState`] is the indexer's owned, injectable record of what has
//! been indexed: per document, the last fingerprint, the chunk count
//! (needed for shrink pruning), and whether the last pass was complete.
//! It can persist to a JSON sidecar so restarts skip unchanged work; a
//! state without a path is purely in-memory and cold-starts reindex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;

/// Bookkeeping record for one indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Fingerprint of the content last indexed.
    pub fingerprint: String,

    /// Number of chunks the document produced.
    pub chunk_count: usize,

    /// False when at least one chunk was skipped (e.g. embedding
    /// failure); incomplete documents are retried on the next pass even
    /// with an unchanged fingerprint.
    pub complete: bool,
}

/// Injectable bookkeeping store for the indexer.
#[derive(Debug, Default)]
pub struct IndexState {
    records: HashMap<String, DocumentRecord>,
    path: Option<PathBuf>,
}

impl IndexState {
    /// An empty, purely in-memory state.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load state from `path`, or start empty if the file is absent.
    ///
    /// The returned state persists back to the same path.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let records: HashMap<String, DocumentRecord> = serde_json::from_str(&content)?;
            info!(count = records.len(), path = %path.display(), "loaded index state");
            records
        } else {
            debug!(path = %path.display(), "no index state file, starting cold");
            HashMap::new()
        };
        Ok(Self {
            records,
            path: Some(path),
        })
    }

    /// Look up the record for a document.
    pub fn get(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.records.get(document_id)
    }

    /// Insert or replace a record.
    pub fn set(&mut self, document_id: impl Into<String>, record: DocumentRecord) {
        self.records.insert(document_id.into(), record);
    }

    /// Drop a record. Returns the previous value, if any.
    pub fn remove(&mut self, document_id: &str) -> Option<DocumentRecord> {
        self.records.remove(document_id)
    }

    /// All tracked document ids.
    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Tracked document ids whose path starts with `prefix`.
    pub fn ids_under(&self, prefix: &str) -> Vec<String> {
        self.records
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of tracked documents.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no documents are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the state to its path, if one is configured.
    pub async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let content = serde_json::to_string(&self.records)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        debug!(count = self.records.len(), "persisted index state");
        Ok(())
    }
}
