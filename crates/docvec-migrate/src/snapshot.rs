//! Portable snapshot format
//!
//! A pretty-printed JSON file:
//! `{version, timestamp, documentCount, documents: [{metadata, chunks}]}`
//! where `metadata` is the full document view including `documentId`.

use chrono::{DateTime, Utc};
use docvec_core::{Chunk, Document, Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Format version written by `Snapshot::new`
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// A set of exported documents with their chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub document_count: usize,
    #[serde(default)]
    pub documents: Vec<SnapshotRecord>,
}

/// One exported document.
///
/// `metadata` and `chunks` stay as raw JSON so that a single malformed record
/// fails on its own during import instead of rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub metadata: Value,
    #[serde(default)]
    pub chunks: Value,
}

impl SnapshotRecord {
    /// Build a record from a document and its chunks
    pub fn new(document: &Document, chunks: Vec<Chunk>) -> Result<Self> {
        Ok(Self {
            metadata: serde_json::to_value(document)?,
            chunks: serde_json::to_value(chunks)?,
        })
    }

    /// The document id, if the metadata carries one
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get("documentId").and_then(|v| v.as_str())
    }

    /// Parse the metadata back into a document
    pub fn document(&self) -> Result<Document> {
        Ok(serde_json::from_value(self.metadata.clone())?)
    }

    /// Parse the chunk list; a missing list is empty
    pub fn chunks(&self) -> Result<Vec<Chunk>> {
        if self.chunks.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(self.chunks.clone())?)
    }

    /// Number of entries in the chunk list, parsed or not
    pub fn chunk_count(&self) -> usize {
        self.chunks.as_array().map_or(0, Vec::len)
    }
}

impl Snapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(documents: Vec<SnapshotRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now(),
            document_count: documents.len(),
            documents,
        }
    }

    /// Total chunks across all records
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(SnapshotRecord::chunk_count).sum()
    }

    /// Read a snapshot file
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Snapshot(format!("failed to read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            StoreError::Snapshot(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::Snapshot(format!("failed to write {}: {e}", path.display()))
        })
    }
}
