//! The document model.
//!
//! A [`Document`] is immutable once its fingerprint is assigned: any
//! content change produces a new fingerprint, which is what drives the
//! indexer's unchanged/updated decisions.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IndexerError, Result};

/// A document to be indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (source path or URI).
    pub id: String,

    /// Raw text content.
    pub content: String,

    /// Content fingerprint (hex SHA-256), used for change detection.
    pub fingerprint: String,

    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,

    /// Document metadata.
    pub metadata: DocumentMetadata,
}

/// Metadata carried by a document and copied onto its index entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name, when the document came from a file.
    pub filename: Option<String>,

    /// File extension, when present.
    pub extension: Option<String>,

    /// Free-form tags.
    pub tags: HashMap<String, String>,
}

impl Document {
    /// Create a document from raw content.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            fingerprint: fingerprint(&content),
            content,
            modified: None,
            metadata: DocumentMetadata::default(),
        }
    }

    /// Read a document from a file, stamping path-derived metadata.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| IndexerError::SourceRead {
            path: path.to_path_buf(),
            source,
        })?;

        let modified = path
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        let metadata = DocumentMetadata {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
            tags: HashMap::new(),
        };

        let mut doc = Self::new(path.to_string_lossy().into_owned(), content);
        doc.modified = modified;
        doc.metadata = metadata;
        Ok(doc)
    }

    /// Attach a free-form tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.tags.insert(key.into(), value.into());
        self
    }

    /// Flatten the metadata into entry tags.
    pub fn entry_tags(&self) -> HashMap<String, String> {
        let mut tags = self.metadata.tags.clone();
        if let Some(ref filename) = self.metadata.filename {
            tags.insert("filename".to_string(), filename.clone());
        }
        if let Some(ref extension) = self.metadata.extension {
            tags.insert("extension".to_string(), extension.clone());
        }
        tags
    }
}

/// Hex SHA-256 of the content.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fingerprint_tracks_content() {
        let a = Document::new("doc", "hello");
        let b = Document::new("doc", "hello");
        let c = Document::new("doc", "hello!");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn from_file_stamps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\nSome content.").unwrap();

        let doc = Document::from_file(&path).unwrap();
        assert_eq!(doc.metadata.filename.as_deref(), Some("notes.md"));
        assert_eq!(doc.metadata.extension.as_deref(), Some("md"));
        assert!(doc.modified.is_some());
        assert_eq!(doc.content, "# Notes\n\nSome content.");
    }

    #[test]
    fn from_file_missing_is_source_read_error() {
        let result = Document::from_file("/nonexistent/path/12345.txt");
        assert!(matches!(result, Err(IndexerError::SourceRead { .. })));
    }

    #[test]
    fn entry_tags_include_path_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}").unwrap();

        let doc = Document::from_file(&path).unwrap().with_tag("lang", "rust");
        let tags = doc.entry_tags();
        assert_eq!(tags.get("filename").map(String::as_str), Some("a.rs"));
        assert_eq!(tags.get("extension").map(String::as_str), Some("rs"));
        assert_eq!(tags.get("lang").map(String::as_str), Some("rust"));
    }
}
