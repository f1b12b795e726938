//! Bridge from OS file notifications to change events.
//!
//! Thin adapter over `notify`: OS events are filtered against the
//! include pattern and ignore list, translated into [`ChangeEvent`]s,
//! and pushed onto the channel the coordinator consumes. All debounce
//! and dispatch logic lives in the coordinator, not here.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, ChangeKind};

/// Configuration for a watched root.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory to watch recursively.
    pub root: PathBuf,

    /// Glob pattern files must match to be indexed.
    pub pattern: String,

    /// Glob patterns to ignore.
    pub ignore_patterns: Vec<String>,

    /// Capacity of the event channel.
    pub channel_capacity: usize,
}

impl WatchConfig {
    /// Create a config for `root` with the default pattern and ignores.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: "**/*.*".to_string(),
            ignore_patterns: Self::default_ignores(),
            channel_capacity: 1024,
        }
    }

    /// Set the include pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Add an ignore pattern.
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_patterns.push(pattern.into());
        self
    }

    /// Default ignore patterns.
    fn default_ignores() -> Vec<String> {
        [
            "**/.git/**",
            "**/node_modules/**",
            "**/target/**",
            "**/__pycache__/**",
            "**/*.pyc",
            "**/*.swp",
            "**/*~",
            "**/.DS_Store",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

/// Compiled include/ignore matcher.
///
/// The include pattern is also tried with a leading `**/` stripped, so
/// `**/*.md` accepts files at the root of the watch as well as nested
/// ones. Ignore patterns match against the full path.
struct PathFilter {
    root: PathBuf,
    include: glob::Pattern,
    include_rootless: Option<glob::Pattern>,
    ignores: Vec<glob::Pattern>,
}

impl PathFilter {
    fn compile(config: &WatchConfig) -> Result<Self> {
        let include = glob::Pattern::new(&config.pattern)
            .map_err(|e| WatcherError::InvalidPattern(format!("{}: {e}", config.pattern)))?;
        let include_rootless = config
            .pattern
            .strip_prefix("**/")
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| WatcherError::InvalidPattern(format!("{}: {e}", config.pattern)))?;
        let ignores = config
            .ignore_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| WatcherError::InvalidPattern(format!("{p}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root: config.root.clone(),
            include,
            include_rootless,
            ignores,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        if self.ignores.iter().any(|p| p.matches_path(path)) {
            return false;
        }
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        self.include.matches_path(rel)
            || self
                .include_rootless
                .as_ref()
                .is_some_and(|p| p.matches_path(rel))
    }
}

/// Translates `notify` events into [`ChangeEvent`]s on a channel.
pub struct WatchBridge {
    config: WatchConfig,
    tx: mpsc::Sender<ChangeEvent>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchBridge {
    /// Create a bridge and the receiver the coordinator will consume.
    pub fn new(config: WatchConfig) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        if !config.root.exists() {
            return Err(WatcherError::RootNotFound(
                config.root.display().to_string(),
            ));
        }
        if !config.root.is_dir() {
            return Err(WatcherError::NotADirectory(
                config.root.display().to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(config.channel_capacity);
        Ok((
            Self {
                config,
                tx,
                watcher: None,
            },
            rx,
        ))
    }

    /// Start forwarding OS notifications.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let filter = PathFilter::compile(&self.config)?;
        let tx = self.tx.clone();

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        // Directory removals bypass the file pattern:
                        // the cascade has to run even though a directory
                        // never matches `*.*`-style includes.
                        if kind != ChangeKind::DirectoryDeleted && !filter.matches(&path) {
                            continue;
                        }
                        if let Err(e) = tx.blocking_send(ChangeEvent::new(kind, path)) {
                            error!("failed to forward change event: {e}");
                        }
                    }
                }
                Err(e) => {
                    error!("watch error: {e}");
                }
            },
        )?;

        watcher.watch(&self.config.root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);
        info!(root = %self.config.root.display(), "watch bridge started");
        Ok(())
    }

    /// Stop forwarding notifications. Queued events stay consumable.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.config.root);
            debug!(root = %self.config.root.display(), "watch bridge stopped");
        }
    }

    /// Whether the bridge is currently forwarding.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}
