//! docvec Core - Document model, store contract, and shared types
//!
//! This crate defines the abstractions every storage backend is built on:
//! - Document / chunk data model
//! - Search options, filters, and results
//! - Common error types
//! - The `VectorStore` capability contract
//! - Configuration management
//! - Cosine similarity scoring

pub mod config;
pub mod similarity;

pub use config::{ConfigError, LoggingConfig, QdrantConfig, StoreConfig};
pub use similarity::cosine_similarity;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Error kinds surfaced by vector store backends and the migration tool
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Upstream request failed during {operation} (status {status}): {body}")]
    UpstreamRequestFailed {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Partial data loss for document {document_id}: {reason}")]
    PartialDataLoss { document_id: String, reason: String },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for StoreError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Document Models
// ============================================================================

/// Descriptive metadata attached to a document.
///
/// Every chunk carries a denormalized copy of this for filtering at query time.
/// Unknown fields supplied by callers are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Origin of the document (exact-match filter key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Original file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Tags (any-of filter key)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Arbitrary caller-supplied fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Attach an extra field
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Check these metadata against search/list filters
    pub fn matches(&self, filters: &SearchFilters) -> bool {
        filters.matches(self)
    }

    /// Drop extra fields that would shadow typed or store-managed fields
    pub fn strip_reserved_fields(&mut self) {
        self.extra.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));
    }
}

/// Field names owned by the document model; never kept in `extra`
pub const RESERVED_FIELDS: &[&str] = &[
    "documentId",
    "chunkIndex",
    "chunkCount",
    "text",
    "createdAt",
    "updatedAt",
    "source",
    "path",
    "title",
    "tags",
];

/// A logical unit of ingested content, as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Caller-supplied unique key
    pub document_id: String,

    /// Descriptive metadata
    #[serde(flatten)]
    pub metadata: DocumentMetadata,

    /// Number of chunks currently stored for this document
    #[serde(default)]
    pub chunk_count: usize,

    /// First upsert timestamp, preserved across re-upserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last upsert timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An indivisible retrievable passage with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Caller-assigned position, unique within the document
    pub chunk_index: u32,

    /// Retrievable text
    pub text: String,

    /// Embedding vector
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(chunk_index: u32, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            chunk_index,
            text: text.into(),
            embedding,
        }
    }
}

/// Whether an upsert created a new document or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    Created,
    Updated,
}

impl std::fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Result of `VectorStore::upsert_document`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub status: UpsertStatus,
}

// ============================================================================
// Search Types
// ============================================================================

/// Default number of search results
pub const DEFAULT_TOP_K: usize = 5;

/// Upper bound on search results
pub const MAX_TOP_K: usize = 20;

/// Metadata filters shared by search and listing.
///
/// `source` is an exact match; `tags` matches when the candidate shares at
/// least one tag with the filter. Both clauses must hold when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl SearchFilters {
    /// Filters that match everything
    pub fn none() -> Self {
        Self::default()
    }

    /// Restrict to an exact source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict to documents carrying any of these tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// True when no clause is set
    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.tags.is_empty()
    }

    /// Evaluate the filters against document metadata
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        if let Some(source) = &self.source {
            if metadata.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|t| metadata.tags.contains(t)) {
            return false;
        }

        true
    }
}

/// Options for `VectorStore::search_similar`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Maximum number of results (0 means default, clamped to `MAX_TOP_K`)
    pub top_k: usize,

    /// Results scoring below this are dropped
    pub min_score: f32,

    /// Metadata filters
    #[serde(default)]
    pub filters: SearchFilters,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
            filters: SearchFilters::default(),
        }
    }
}

impl SearchOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set top-k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set minimum score
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set filters
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// The number of results a backend should actually return
    pub fn effective_top_k(&self) -> usize {
        match self.top_k {
            0 => DEFAULT_TOP_K,
            k => k.min(MAX_TOP_K),
        }
    }
}

/// Metadata returned with each search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: u32,

    #[serde(flatten)]
    pub document: DocumentMetadata,
}

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Chunk text
    pub text: String,

    /// Relevance score (higher is better)
    pub score: f32,

    /// Owning document and chunk position
    pub metadata: ChunkMetadata,
}

/// Store-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,

    /// Embedding dimensionality, when the backend knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_dimension: Option<usize>,
}

// ============================================================================
// Traits
// ============================================================================

/// Capability contract every storage backend implements.
///
/// Documents are stored as sets of chunks; `upsert_document` replaces a
/// document's chunk set wholesale and `delete_document` removes every chunk.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend label for logging
    fn name(&self) -> &str;

    /// Insert or replace a document and all of its chunks
    async fn upsert_document(
        &self,
        document_id: &str,
        metadata: DocumentMetadata,
        chunks: Vec<Chunk>,
    ) -> Result<UpsertOutcome>;

    /// Return the chunks most similar to `query_embedding`, best first
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>>;

    /// Fetch a document's metadata
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;

    /// List documents matching the filters
    async fn list_documents(&self, filters: &SearchFilters) -> Result<Vec<Document>>;

    /// List one page of documents matching the filters
    async fn list_documents_page(
        &self,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let documents = self.list_documents(filters).await?;
        Ok(documents.into_iter().skip(offset).take(limit).collect())
    }

    /// Remove a document and its chunks; true if anything was removed
    async fn delete_document(&self, document_id: &str) -> Result<bool>;

    /// Document and chunk counts
    async fn get_stats(&self) -> Result<StoreStats>;

    /// Liveness probe; never fails, reports problems as `false`
    async fn health_check(&self) -> bool;

    /// Raw chunks (with embeddings) of a document, for export and migration.
    ///
    /// Backends that cannot expose embeddings keep the default, which reports
    /// `StoreError::PartialDataLoss`.
    async fn export_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Err(StoreError::PartialDataLoss {
            document_id: document_id.to_string(),
            reason: format!("{} backend cannot expose raw chunk embeddings", self.name()),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_serializes_flat_camel_case() {
        let doc = Document {
            document_id: "doc1".to_string(),
            metadata: DocumentMetadata::new()
                .with_source("wiki")
                .with_title("Cats")
                .with_tag("animals")
                .with_field("lang", "en"),
            chunk_count: 2,
            created_at: None,
            updated_at: None,
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["documentId"], "doc1");
        assert_eq!(value["source"], "wiki");
        assert_eq!(value["title"], "Cats");
        assert_eq!(value["tags"], json!(["animals"]));
        assert_eq!(value["lang"], "en");
        assert_eq!(value["chunkCount"], 2);
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_document_deserialize_keeps_extra_fields() {
        let doc: Document = serde_json::from_value(json!({
            "documentId": "doc7",
            "source": "upload",
            "tags": ["a", "b"],
            "chunkCount": 3,
            "author": "someone",
            "createdAt": "2024-01-02T03:04:05Z"
        }))
        .unwrap();

        assert_eq!(doc.document_id, "doc7");
        assert_eq!(doc.metadata.source.as_deref(), Some("upload"));
        assert_eq!(doc.metadata.tags.len(), 2);
        assert_eq!(doc.chunk_count, 3);
        assert_eq!(doc.metadata.extra.get("author"), Some(&json!("someone")));
        assert!(!doc.metadata.extra.contains_key("documentId"));
        assert!(doc.created_at.is_some());
    }

    #[test]
    fn test_strip_reserved_fields() {
        let mut meta = DocumentMetadata::new()
            .with_field("documentId", "spoofed")
            .with_field("text", "spoofed")
            .with_field("lang", "en");
        meta.strip_reserved_fields();
        assert_eq!(meta.extra.len(), 1);
        assert!(meta.extra.contains_key("lang"));
    }

    #[test]
    fn test_filters_source_is_exact() {
        let meta = DocumentMetadata::new().with_source("docs");
        assert!(SearchFilters::none().with_source("docs").matches(&meta));
        assert!(!SearchFilters::none().with_source("doc").matches(&meta));
        assert!(!SearchFilters::none()
            .with_source("docs")
            .matches(&DocumentMetadata::new()));
    }

    #[test]
    fn test_filters_tags_match_any() {
        let meta = DocumentMetadata::new().with_tag("vehicles").with_tag("red");
        assert!(SearchFilters::none()
            .with_tags(["boats", "red"])
            .matches(&meta));
        assert!(!SearchFilters::none().with_tags(["boats"]).matches(&meta));
        assert!(!SearchFilters::none()
            .with_tags(["red"])
            .matches(&DocumentMetadata::new()));
    }

    #[test]
    fn test_filters_combine_with_and() {
        let meta = DocumentMetadata::new().with_source("a").with_tag("x");
        let filters = SearchFilters::none().with_source("b").with_tags(["x"]);
        assert!(!filters.matches(&meta));
        assert!(SearchFilters::none().is_empty());
        assert!(!filters.is_empty());
    }

    #[test]
    fn test_effective_top_k() {
        assert_eq!(SearchOptions::default().effective_top_k(), 5);
        assert_eq!(SearchOptions::new().with_top_k(0).effective_top_k(), 5);
        assert_eq!(SearchOptions::new().with_top_k(3).effective_top_k(), 3);
        assert_eq!(SearchOptions::new().with_top_k(100).effective_top_k(), 20);
    }

    #[test]
    fn test_upsert_status_serialization() {
        assert_eq!(
            serde_json::to_value(UpsertStatus::Updated).unwrap(),
            json!("updated")
        );
        assert_eq!(UpsertStatus::Created.to_string(), "created");
    }

    struct EmbeddinglessStore;

    #[async_trait]
    impl VectorStore for EmbeddinglessStore {
        fn name(&self) -> &str {
            "embeddingless"
        }

        async fn upsert_document(
            &self,
            document_id: &str,
            _metadata: DocumentMetadata,
            chunks: Vec<Chunk>,
        ) -> Result<UpsertOutcome> {
            Ok(UpsertOutcome {
                document_id: document_id.to_string(),
                chunk_count: chunks.len(),
                status: UpsertStatus::Created,
            })
        }

        async fn search_similar(&self, _: &[f32], _: &SearchOptions) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }

        async fn get_document(&self, _: &str) -> Result<Option<Document>> {
            Ok(None)
        }

        async fn list_documents(&self, _: &SearchFilters) -> Result<Vec<Document>> {
            Ok((0..5)
                .map(|i| Document {
                    document_id: format!("doc{i}"),
                    metadata: DocumentMetadata::new(),
                    chunk_count: 0,
                    created_at: None,
                    updated_at: None,
                })
                .collect())
        }

        async fn delete_document(&self, _: &str) -> Result<bool> {
            Ok(false)
        }

        async fn get_stats(&self) -> Result<StoreStats> {
            Ok(StoreStats::default())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_default_export_reports_partial_data_loss() {
        let store = EmbeddinglessStore;
        let err = store.export_chunks("doc1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::PartialDataLoss { ref document_id, .. } if document_id == "doc1"
        ));
    }

    #[tokio::test]
    async fn test_default_list_documents_page() {
        let store = EmbeddinglessStore;
        let page = store
            .list_documents_page(&SearchFilters::none(), 2, 1)
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["doc1", "doc2"]);
    }
}
