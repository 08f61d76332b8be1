//! In-memory vector store
//!
//! Keeps every document and chunk in process memory and answers queries
//! with a brute-force cosine similarity scan. Nothing survives a restart.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chrono::Utc;
use docvec_core::{
    cosine_similarity, Chunk, ChunkMetadata, Document, DocumentMetadata, Result, SearchFilters,
    SearchHit, SearchOptions, StoreStats, UpsertOutcome, UpsertStatus, VectorStore,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::dedupe_chunks;

/// A chunk tagged with its owning document and a copy of its metadata
#[derive(Debug, Clone)]
struct ChunkRecord {
    chunk: Chunk,
    metadata: ChunkMetadata,
}

#[derive(Debug, Default)]
struct MemoryIndex {
    documents: BTreeMap<String, Document>,
    chunks: Vec<ChunkRecord>,
}

impl MemoryIndex {
    fn remove_chunks(&mut self, document_id: &str) {
        self.chunks
            .retain(|record| record.metadata.document_id != document_id);
    }
}

/// Process-local vector store.
///
/// A single lock guards the index, so each upsert or delete is applied
/// atomically and searches never observe a half-replaced document.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    index: RwLock<MemoryIndex>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_document(
        &self,
        document_id: &str,
        mut metadata: DocumentMetadata,
        chunks: Vec<Chunk>,
    ) -> Result<UpsertOutcome> {
        metadata.strip_reserved_fields();
        let chunks = dedupe_chunks(chunks);
        let now = Utc::now();

        let mut index = self.index.write().await;

        let existing_created_at = index.documents.get(document_id).map(|d| d.created_at);
        let status = match existing_created_at {
            Some(_) => UpsertStatus::Updated,
            None => UpsertStatus::Created,
        };

        index.remove_chunks(document_id);
        index.documents.insert(
            document_id.to_string(),
            Document {
                document_id: document_id.to_string(),
                metadata: metadata.clone(),
                chunk_count: chunks.len(),
                created_at: existing_created_at.flatten().or(Some(now)),
                updated_at: Some(now),
            },
        );

        let chunk_count = chunks.len();
        index.chunks.extend(chunks.into_iter().map(|chunk| ChunkRecord {
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                chunk_index: chunk.chunk_index,
                document: metadata.clone(),
            },
            chunk,
        }));

        tracing::debug!(document_id, chunk_count, %status, "memory store upsert");

        Ok(UpsertOutcome {
            document_id: document_id.to_string(),
            chunk_count,
            status,
        })
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let index = self.index.read().await;

        let mut hits: Vec<SearchHit> = index
            .chunks
            .iter()
            .filter(|record| options.filters.matches(&record.metadata.document))
            .map(|record| SearchHit {
                text: record.chunk.text.clone(),
                score: cosine_similarity(query_embedding, &record.chunk.embedding),
                metadata: record.metadata.clone(),
            })
            .filter(|hit| hit.score >= options.min_score)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(options.effective_top_k());

        Ok(hits)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        Ok(self.index.read().await.documents.get(document_id).cloned())
    }

    async fn list_documents(&self, filters: &SearchFilters) -> Result<Vec<Document>> {
        let index = self.index.read().await;
        Ok(index
            .documents
            .values()
            .filter(|doc| filters.matches(&doc.metadata))
            .cloned()
            .collect())
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let mut index = self.index.write().await;
        if index.documents.remove(document_id).is_none() {
            return Ok(false);
        }
        index.remove_chunks(document_id);
        Ok(true)
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let index = self.index.read().await;
        Ok(StoreStats {
            document_count: index.documents.len(),
            chunk_count: index.chunks.len(),
            vector_dimension: index.chunks.first().map(|r| r.chunk.embedding.len()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn export_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let index = self.index.read().await;
        Ok(index
            .chunks
            .iter()
            .filter(|record| record.metadata.document_id == document_id)
            .map(|record| record.chunk.clone())
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
