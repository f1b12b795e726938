//! File-change events.
//!
//! The reindex coordinator consumes these regardless of where they come
//! from: the `notify`-backed [`WatchBridge`](crate::watcher::WatchBridge)
//! in production, or synthetic sequences in tests.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// File was created.
    Created,

    /// File content was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// A directory was deleted; every document under it must go.
    DirectoryDeleted,
}

impl ChangeKind {
    /// Map a notify event kind onto a change kind.
    ///
    /// Renames arrive as two events: the old path maps to `Deleted`,
    /// the new path to `Created`. Access and metadata-only events are
    /// dropped (`None`).
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::event::{ModifyKind, RemoveKind, RenameMode};

        match kind {
            notify::EventKind::Create(_) => Some(Self::Created),
            notify::EventKind::Modify(modify) => match modify {
                ModifyKind::Name(RenameMode::From) => Some(Self::Deleted),
                ModifyKind::Name(RenameMode::To) => Some(Self::Created),
                ModifyKind::Metadata(_) => None,
                _ => Some(Self::Modified),
            },
            notify::EventKind::Remove(RemoveKind::Folder) => Some(Self::DirectoryDeleted),
            notify::EventKind::Remove(_) => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// A single file-change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The kind of change.
    pub kind: ChangeKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a new change event stamped with the current time.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_carries_path_and_kind() {
        let event = ChangeEvent::new(ChangeKind::Created, "/tmp/a.md");
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.path, PathBuf::from("/tmp/a.md"));
    }

    #[test]
    fn notify_kinds_map_to_change_kinds() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};

        assert_eq!(
            ChangeKind::from_notify(&notify::EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            ChangeKind::from_notify(&notify::EventKind::Modify(ModifyKind::Any)),
            Some(ChangeKind::Modified)
        );
        assert_eq!(
            ChangeKind::from_notify(&notify::EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Deleted)
        );
        assert_eq!(
            ChangeKind::from_notify(&notify::EventKind::Remove(RemoveKind::Folder)),
            Some(ChangeKind::DirectoryDeleted)
        );
        assert_eq!(
            ChangeKind::from_notify(&notify::EventKind::Access(notify::event::AccessKind::Any)),
            None
        );
    }
}
