//! The debounced reindex coordinator.
//!
//! A single consumer loop owns the pending set and the debounce
//! deadline explicitly: change events arrive over a channel, bursts
//! collapse into one indexing pass covering the union of pending paths,
//! and events that arrive while a pass is running simply queue in the
//! channel and start a fresh debounce cycle afterwards — nothing is
//! dropped. Per watched root the loop moves `idle -> pending ->
//! indexing -> idle`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use semdex_indexer::{IndexSummary, Indexer};

use crate::error::Result;
use crate::event::{ChangeEvent, ChangeKind};

/// Configuration for the reindex coordinator.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorConfig {
    /// Quiet interval that must elapse before a pass starts. Repeated
    /// changes inside the window collapse into one pass.
    pub debounce: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Counters describing coordinator activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorStats {
    /// Indexing passes executed.
    pub passes: u64,

    /// Paths processed across all passes.
    pub processed: u64,

    /// Paths that failed; failures never block the rest of a pass.
    pub failed: u64,
}

#[derive(Default)]
struct StatsInner {
    passes: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Drives incremental reindexing from file-change events.
pub struct ReindexCoordinator {
    indexer: Arc<Indexer>,
    config: CoordinatorConfig,
    cancel: CancellationToken,
    stats: StatsInner,
}

impl ReindexCoordinator {
    /// Create a coordinator over an indexer.
    pub fn new(indexer: Arc<Indexer>, config: CoordinatorConfig) -> Self {
        Self {
            indexer,
            config,
            cancel: CancellationToken::new(),
            stats: StatsInner::default(),
        }
    }

    /// Token that tears the consumer loop down. An in-flight indexing
    /// pass finishes; it is never aborted mid-way.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current activity counters.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            passes: self.stats.passes.load(Ordering::Relaxed),
            processed: self.stats.processed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Consume events until cancellation or channel close.
    ///
    /// Closing the channel flushes whatever is still pending before the
    /// loop exits, so no acknowledged change is ever silently dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>) {
        let mut pending: HashMap<PathBuf, ChangeKind> = HashMap::new();
        let mut deadline: Option<Instant> = None;
        let far_future = Duration::from_secs(86_400);

        loop {
            let wake = deadline.unwrap_or_else(|| Instant::now() + far_future);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("coordinator cancelled");
                    break;
                }
                maybe = events.recv() => match maybe {
                    Some(event) => {
                        debug!(path = %event.path.display(), kind = ?event.kind, "change queued");
                        // Latest kind wins per path.
                        pending.insert(event.path, event.kind);
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    None => {
                        if !pending.is_empty() {
                            self.flush(&mut pending).await;
                        }
                        debug!("event channel closed");
                        break;
                    }
                },
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    deadline = None;
                    self.flush(&mut pending).await;
                }
            }
        }
    }

    /// Run one indexing pass over the pending set.
    async fn flush(&self, pending: &mut HashMap<PathBuf, ChangeKind>) {
        let mut batch: Vec<(PathBuf, ChangeKind)> = pending.drain().collect();
        if batch.is_empty() {
            return;
        }
        batch.sort_by(|a, b| a.0.cmp(&b.0));

        info!(paths = batch.len(), "starting indexing pass");
        self.stats.passes.fetch_add(1, Ordering::Relaxed);

        for (path, kind) in batch {
            let result = self.dispatch(&path, kind).await;
            match result {
                Ok(()) => {
                    self.stats.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "reindex failed for path");
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        info!("indexing pass finished");
    }

    async fn dispatch(&self, path: &Path, kind: ChangeKind) -> Result<()> {
        let id = path.to_string_lossy();
        match kind {
            ChangeKind::Deleted => {
                self.indexer.remove_document(&id).await?;
            }
            ChangeKind::DirectoryDeleted => {
                let prefix = format!("{id}{}", std::path::MAIN_SEPARATOR);
                let removed = self.indexer.remove_documents_under(&prefix).await?;
                debug!(prefix = %prefix, removed, "cascaded directory removal");
            }
            ChangeKind::Created | ChangeKind::Modified => {
                if !path.exists() {
                    debug!(path = %path.display(), "path vanished before indexing, skipping");
                    return Ok(());
                }
                self.indexer.index_file(path).await?;
            }
        }
        Ok(())
    }

    /// Full fingerprint sweep of a watched root.
    ///
    /// Mitigates dropped or coalesced notifications: documents whose
    /// files vanished are removed, then the whole root is re-walked —
    /// unchanged fingerprints keep the sweep cheap.
    pub async fn reconcile(&self, root: &Path, pattern: &str) -> Result<IndexSummary> {
        let prefix = format!(
            "{}{}",
            root.to_string_lossy(),
            std::path::MAIN_SEPARATOR
        );
        for id in self.indexer.tracked().await {
            if id.starts_with(&prefix) && !Path::new(&id).exists() {
                self.indexer.remove_document(&id).await?;
            }
        }
        let summary = self.indexer.index_directory(root, pattern).await?;
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "reconcile sweep finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use semdex_chunking::{Chunker, ChunkerConfig, WordTokenizer};
    use semdex_indexer::{IndexState, fingerprint};
    use semdex_store::{HashProvider, MemoryVectorStore};

    fn build_indexer(store: Arc<MemoryVectorStore>) -> Arc<Indexer> {
        let chunker = Chunker::new(
            ChunkerConfig {
                chunk_size_tokens: 50,
                overlap_tokens: 10,
            },
            Arc::new(WordTokenizer),
        )
        .unwrap();
        Arc::new(Indexer::new(
            chunker,
            Arc::new(HashProvider::new(16)),
            store,
            IndexState::in_memory(),
        ))
    }

    fn coordinator(indexer: Arc<Indexer>, debounce: Duration) -> Arc<ReindexCoordinator> {
        Arc::new(ReindexCoordinator::new(
            indexer,
            CoordinatorConfig { debounce },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_pass() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");

        let store = Arc::new(MemoryVectorStore::new());
        let indexer = build_indexer(store);
        let coordinator = coordinator(indexer.clone(), Duration::from_millis(500));

        let (tx, rx) = mpsc::channel(64);
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx).await })
        };

        // Five rapid writes inside one debounce window.
        for i in 0..5 {
            std::fs::write(&file, format!("version {i} of the content")).unwrap();
            tx.send(ChangeEvent::new(ChangeKind::Modified, &file))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(coordinator.stats().passes, 1);
        let id = file.to_string_lossy().to_string();
        let record = indexer.record(&id).await.unwrap();
        assert_eq!(record.fingerprint, fingerprint("version 4 of the content"));

        coordinator.cancellation_token().cancel();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn changes_after_a_pass_start_a_new_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");

        let indexer = build_indexer(Arc::new(MemoryVectorStore::new()));
        let coordinator = coordinator(indexer.clone(), Duration::from_millis(200));

        let (tx, rx) = mpsc::channel(64);
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx).await })
        };

        std::fs::write(&file, "first content").unwrap();
        tx.send(ChangeEvent::new(ChangeKind::Created, &file))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(coordinator.stats().passes, 1);

        std::fs::write(&file, "second content").unwrap();
        tx.send(ChangeEvent::new(ChangeKind::Modified, &file))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(coordinator.stats().passes, 2);

        let id = file.to_string_lossy().to_string();
        let record = indexer.record(&id).await.unwrap();
        assert_eq!(record.fingerprint, fingerprint("second content"));

        coordinator.cancellation_token().cancel();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_removes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");
        std::fs::write(&file, "short lived content").unwrap();

        let store = Arc::new(MemoryVectorStore::new());
        let indexer = build_indexer(store.clone());
        let id = file.to_string_lossy().to_string();
        indexer.index_file(&file).await.unwrap();
        assert!(store.len().await > 0);

        let coordinator = coordinator(indexer.clone(), Duration::from_millis(100));
        let (tx, rx) = mpsc::channel(64);
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx).await })
        };

        std::fs::remove_file(&file).unwrap();
        tx.send(ChangeEvent::new(ChangeKind::Deleted, &file))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len().await, 0);
        assert!(indexer.record(&id).await.is_none());

        coordinator.cancellation_token().cancel();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn directory_deletion_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let inside = sub.join("a.md");
        let outside = dir.path().join("b.md");
        std::fs::write(&inside, "inside the removed directory").unwrap();
        std::fs::write(&outside, "outside the removed directory").unwrap();

        let indexer = build_indexer(Arc::new(MemoryVectorStore::new()));
        indexer.index_file(&inside).await.unwrap();
        indexer.index_file(&outside).await.unwrap();

        let coordinator = coordinator(indexer.clone(), Duration::from_millis(100));
        let (tx, rx) = mpsc::channel(64);
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx).await })
        };

        std::fs::remove_file(&inside).unwrap();
        std::fs::remove_dir(&sub).unwrap();
        tx.send(ChangeEvent::new(ChangeKind::DirectoryDeleted, &sub))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(
            indexer
                .record(&inside.to_string_lossy())
                .await
                .is_none()
        );
        assert!(
            indexer
                .record(&outside.to_string_lossy())
                .await
                .is_some()
        );

        coordinator.cancellation_token().cancel();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_sweep_detects_drift() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.md");
        let removed = dir.path().join("removed.md");
        std::fs::write(&kept, "kept file content").unwrap();
        std::fs::write(&removed, "doomed file content").unwrap();

        let indexer = build_indexer(Arc::new(MemoryVectorStore::new()));
        indexer.index_directory(dir.path(), "**/*.md").await.unwrap();

        // Drift without notifications: one file deleted, one added.
        std::fs::remove_file(&removed).unwrap();
        let added = dir.path().join("added.md");
        std::fs::write(&added, "added behind the watcher's back").unwrap();

        let coordinator = coordinator(indexer.clone(), Duration::from_millis(100));
        let summary = coordinator
            .reconcile(dir.path(), "**/*.md")
            .await
            .unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.unchanged, 1);
        assert!(indexer.record(&removed.to_string_lossy()).await.is_none());
        assert!(indexer.record(&added.to_string_lossy()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_channel_flushes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.md");
        std::fs::write(&file, "late arriving content").unwrap();

        let indexer = build_indexer(Arc::new(MemoryVectorStore::new()));
        let coordinator = coordinator(indexer.clone(), Duration::from_secs(30));

        let (tx, rx) = mpsc::channel(64);
        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(rx).await })
        };

        tx.send(ChangeEvent::new(ChangeKind::Created, &file))
            .await
            .unwrap();
        // Drop the sender long before the debounce would fire.
        drop(tx);
        runner.await.unwrap();

        assert_eq!(coordinator.stats().passes, 1);
        assert!(indexer.record(&file.to_string_lossy()).await.is_some());
    }
}
