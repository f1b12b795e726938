//! # semdex-watcher
//!
//! Live reindexing for semdex: file-change events, the debounced
//! reindex coordinator, and a thin `notify` bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Reindex pipeline                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchBridge ──► ChangeEvent channel ──► ReindexCoordinator    │
//! │   (notify)              │                     │                 │
//! │                         ▼                     ▼                 │
//! │                pattern filtering     debounce ──► Indexer      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod coordinator;
pub mod error;
pub mod event;
pub mod watcher;

pub use coordinator::{CoordinatorConfig, CoordinatorStats, ReindexCoordinator};
pub use error::{Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind};
pub use watcher::{WatchBridge, WatchConfig};
