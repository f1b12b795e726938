//! The unified semdex engine.
//!
//! Wires the chunker, embedding provider, vector store, indexer,
//! searcher, and context assembler together behind one entry point,
//! and spawns watch sessions for live reindexing.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use semdex_chunking::{Chunker, HeuristicTokenizer, TokenCounter};
use semdex_indexer::{Document, IndexOutcome, IndexState, IndexSummary, Indexer};
use semdex_search::{
    ContextAssembler, ContextWindow, GroupedResult, SearchResult, Searcher,
};
use semdex_store::{
    EmbeddingProvider, EntryFilter, HashProvider, MemoryVectorStore, VectorStore,
};
use semdex_watcher::{ReindexCoordinator, WatchBridge, WatchConfig};

use crate::config::EngineConfig;
use crate::error::Result;

/// The assembled semdex pipeline.
pub struct Engine {
    config: EngineConfig,
    indexer: Arc<Indexer>,
    searcher: Searcher,
    assembler: ContextAssembler,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Engine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Build an engine with default capabilities and configuration.
    pub async fn with_defaults() -> Result<Self> {
        Self::builder().build().await
    }

    /// Index one document.
    pub async fn index_document(&self, doc: &Document) -> Result<IndexOutcome> {
        Ok(self.indexer.index_document(doc).await?)
    }

    /// Read and index one file.
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<IndexOutcome> {
        Ok(self.indexer.index_file(path).await?)
    }

    /// Index every file under `root` matching `pattern`.
    pub async fn index_directory(&self, root: &Path, pattern: &str) -> Result<IndexSummary> {
        Ok(self.indexer.index_directory(root, pattern).await?)
    }

    /// Remove a document and its entries.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        Ok(self.indexer.remove_document(document_id).await?)
    }

    /// Search for the `k` best chunk matches.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.searcher.search(query, k, filter).await?)
    }

    /// Search with chunks of the same document collapsed into groups.
    pub async fn search_grouped(
        &self,
        query: &str,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<GroupedResult>> {
        Ok(self.searcher.search_grouped(query, k, filter).await?)
    }

    /// Assemble ranked results into a token-bounded context window.
    pub fn assemble(&self, results: &[SearchResult], budget: usize) -> ContextWindow {
        self.assembler.assemble(results, budget)
    }

    /// Search and assemble in one call, using the configured budget.
    pub async fn query(&self, text: &str, k: usize) -> Result<ContextWindow> {
        let results = self.search(text, k, None).await?;
        Ok(self.assemble(&results, self.config.default_budget))
    }

    /// Full fingerprint sweep of a root (see
    /// [`ReindexCoordinator::reconcile`]).
    pub async fn reconcile(&self, root: &Path, pattern: &str) -> Result<IndexSummary> {
        let coordinator =
            ReindexCoordinator::new(self.indexer.clone(), self.config.coordinator);
        Ok(coordinator.reconcile(root, pattern).await?)
    }

    /// Index the existing files under the watch root, then start live
    /// reindexing of subsequent changes.
    pub async fn watch(&self, config: WatchConfig) -> Result<WatchSession> {
        let summary = self.index_directory(&config.root, &config.pattern).await?;
        info!(
            root = %config.root.display(),
            indexed = summary.total(),
            "initial indexing pass before watching"
        );

        let (mut bridge, events) = WatchBridge::new(config)?;
        bridge.start()?;

        let coordinator = Arc::new(ReindexCoordinator::new(
            self.indexer.clone(),
            self.config.coordinator,
        ));
        let handle = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(events).await })
        };

        Ok(WatchSession {
            bridge,
            coordinator,
            handle,
        })
    }

    /// The engine's indexer.
    pub fn indexer(&self) -> Arc<Indexer> {
        self.indexer.clone()
    }

    /// Engine statistics.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            documents: self.indexer.tracked().await.len(),
            provider: self.provider.name().to_string(),
            dimension: self.provider.dimension(),
        }
    }
}

/// A running watch session.
///
/// Dropping the session without calling [`shutdown`](Self::shutdown)
/// leaves the consumer task running until its channel closes.
pub struct WatchSession {
    bridge: WatchBridge,
    coordinator: Arc<ReindexCoordinator>,
    handle: JoinHandle<()>,
}

impl WatchSession {
    /// The coordinator driving this session.
    pub fn coordinator(&self) -> &Arc<ReindexCoordinator> {
        &self.coordinator
    }

    /// Stop the notification bridge and let the in-flight pass finish.
    pub async fn shutdown(mut self) {
        self.bridge.stop();
        self.coordinator.cancellation_token().cancel();
        let _ = self.handle.await;
        info!("watch session shut down");
    }
}

/// Statistics about the engine.
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Documents tracked by the indexer.
    pub documents: usize,

    /// Name of the embedding provider.
    pub provider: String,

    /// Embedding dimension.
    pub dimension: usize,
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    counter: Option<Arc<dyn TokenCounter>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
}

impl EngineBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            counter: None,
            provider: None,
            store: None,
        }
    }

    /// Use the given configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given token counter (heuristic by default).
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Use the given embedding provider (deterministic hash vectors by
    /// default; plug an API-backed provider for real deployments).
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use the given vector store (in-memory by default).
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the engine.
    pub async fn build(self) -> Result<Engine> {
        let counter = self
            .counter
            .unwrap_or_else(|| Arc::new(HeuristicTokenizer));
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(HashProvider::default()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryVectorStore::new()));

        let chunker = Chunker::new(self.config.chunking, counter.clone())?;

        let state = match self.config.state_path {
            Some(ref path) => IndexState::load(path).await?,
            None => IndexState::in_memory(),
        };

        let indexer = Arc::new(
            Indexer::new(chunker, provider.clone(), store.clone(), state)
                .with_retry(self.config.retry),
        );
        let searcher =
            Searcher::new(provider.clone(), store).with_config(self.config.searcher);
        let assembler =
            ContextAssembler::new(counter).with_config(self.config.assembler.clone());

        info!(provider = provider.name(), "engine built");
        Ok(Engine {
            config: self.config,
            indexer,
            searcher,
            assembler,
            provider,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn builder_defaults_produce_an_engine() {
        let engine = Engine::with_defaults().await.unwrap();
        let stats = engine.stats().await;
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.provider, "hash");
    }

    #[tokio::test]
    async fn invalid_chunking_config_fails_the_build() {
        let config = EngineConfig::new().with_chunking(semdex_chunking::ChunkerConfig {
            chunk_size_tokens: 10,
            overlap_tokens: 10,
        });
        let result = Engine::builder().with_config(config).build().await;
        assert!(result.is_err());
    }
}
