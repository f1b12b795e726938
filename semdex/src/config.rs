//! Configuration for the semdex engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use semdex_chunking::ChunkerConfig;
use semdex_indexer::RetryConfig;
use semdex_search::{AssemblerConfig, SearcherConfig};
use semdex_watcher::CoordinatorConfig;

/// Configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chunking parameters.
    pub chunking: ChunkerConfig,

    /// Search and grouping parameters.
    pub searcher: SearcherConfig,

    /// Context assembly parameters.
    pub assembler: AssemblerConfig,

    /// Retry policy for transient store failures.
    pub retry: RetryConfig,

    /// Debounce parameters for live reindexing.
    pub coordinator: CoordinatorConfig,

    /// Where to persist fingerprint bookkeeping. Without a path the
    /// bookkeeping is in-memory only and cold starts reindex everything.
    pub state_path: Option<PathBuf>,

    /// Token budget used by [`Engine::query`](crate::Engine::query).
    pub default_budget: usize,
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            searcher: SearcherConfig::default(),
            assembler: AssemblerConfig::default(),
            retry: RetryConfig::default(),
            coordinator: CoordinatorConfig::default(),
            state_path: None,
            default_budget: 4000,
        }
    }

    /// Set the chunking parameters.
    pub fn with_chunking(mut self, chunking: ChunkerConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Set the searcher parameters.
    pub fn with_searcher(mut self, searcher: SearcherConfig) -> Self {
        self.searcher = searcher;
        self
    }

    /// Set the assembler parameters.
    pub fn with_assembler(mut self, assembler: AssemblerConfig) -> Self {
        self.assembler = assembler;
        self
    }

    /// Persist bookkeeping to the given path.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Set the default token budget for assembled contexts.
    pub fn with_default_budget(mut self, budget: usize) -> Self {
        self.default_budget = budget;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
