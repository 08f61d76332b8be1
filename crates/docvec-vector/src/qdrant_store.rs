//! Qdrant implementation for vector storage
//!
//! Talks to the Qdrant REST API with JSON requests. Every chunk becomes a
//! point whose payload carries the owning document's metadata; documents
//! themselves only exist as groups of points sharing a `documentId`.
//!
//! Write paths raise on any non-success response. Read paths degrade to
//! empty results so queries stay available when the server misbehaves.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvec_core::{
    Chunk, ChunkMetadata, Document, DocumentMetadata, QdrantConfig, Result, SearchFilters,
    SearchHit, SearchOptions, StoreError, StoreStats, UpsertOutcome, UpsertStatus, VectorStore,
};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::OnceCell;

use crate::{dedupe_chunks, derive_point_id};

/// Points sent per upsert request
const UPSERT_BATCH_SIZE: usize = 256;

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
    base_url: String,
    collection_ready: OnceCell<()>,
}

impl QdrantStore {
    /// Create a new Qdrant client; no request is made until first use
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StoreError::Configuration(format!("Qdrant client setup failed: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
            collection_ready: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &QdrantConfig {
        &self.config
    }

    /// Make sure the collection exists, creating it on first use.
    ///
    /// Succeeds once per store; a collection created concurrently by another
    /// client counts as success.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| self.create_collection_if_missing())
            .await
            .map(|_| ())
    }

    async fn create_collection_if_missing(&self) -> Result<()> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "size": self.config.vector_size,
                "distance": "Cosine"
            },
            "optimizers_config": {
                "indexing_threshold": self.config.indexing_threshold
            }
        });

        let response = self
            .client
            .put(self.collection_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("create collection", e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            tracing::info!(
                collection = %self.config.collection,
                vector_size = self.config.vector_size,
                "Qdrant collection ready"
            );
            return Ok(());
        }

        // Lost a creation race: the collection is there now
        let error = upstream_error("create collection", response).await;
        if self.collection_exists().await.unwrap_or(false) {
            return Ok(());
        }
        Err(error)
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| transport_error("collection check", e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(upstream_error("collection check", response).await),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.config.collection)
    }

    fn points_url(&self, action: &str) -> String {
        format!("{}/points{action}", self.collection_url())
    }

    /// Send a JSON request and unwrap Qdrant's `{"result": ...}` envelope
    async fn request<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<T> {
        tracing::debug!(operation, %url, "Qdrant request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if !response.status().is_success() {
            return Err(upstream_error(operation, response).await);
        }

        let envelope: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| transport_error(operation, e))?;

        Ok(envelope.result)
    }

    /// Scroll through every point matching `filter`, following
    /// `next_page_offset` until the server reports no further page
    async fn scroll_all(
        &self,
        filter: Option<Value>,
        with_payload: Value,
        with_vector: bool,
    ) -> Result<Vec<RetrievedPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": self.config.scroll_page_size,
                "with_payload": with_payload,
                "with_vector": with_vector,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let page: ScrollPage = self
                .request("scroll", Method::POST, self.points_url("/scroll"), Some(&body))
                .await?;
            points.extend(page.points);

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }

    async fn count_points(&self, filter: &Value) -> Result<usize> {
        let body = json!({ "filter": filter, "exact": true });
        let count: CountResult = self
            .request("count", Method::POST, self.points_url("/count"), Some(&body))
            .await?;
        Ok(count.count)
    }

    async fn delete_points(&self, filter: &Value) -> Result<()> {
        let body = json!({ "filter": filter });
        let _: Value = self
            .request(
                "delete",
                Method::POST,
                self.points_url("/delete?wait=true"),
                Some(&body),
            )
            .await?;
        Ok(())
    }

    /// Payload of any one point belonging to the document
    async fn first_payload(&self, document_id: &str) -> Result<Option<PointPayload>> {
        let body = json!({
            "filter": document_filter(document_id),
            "limit": 1,
            "with_payload": true,
            "with_vector": false,
        });

        let page: ScrollPage = self
            .request("scroll", Method::POST, self.points_url("/scroll"), Some(&body))
            .await?;

        Ok(page
            .points
            .into_iter()
            .next()
            .and_then(|point| point.payload)
            .and_then(parse_payload))
    }

    async fn fetch_document(&self, document_id: &str) -> Result<Option<Document>> {
        self.ensure_collection().await?;

        let Some(payload) = self.first_payload(document_id).await? else {
            return Ok(None);
        };
        let chunk_count = self.count_points(&document_filter(document_id)).await?;

        Ok(Some(payload.into_document(chunk_count)))
    }

    async fn collect_documents(&self, filters: &SearchFilters) -> Result<Vec<Document>> {
        self.ensure_collection().await?;

        let points = self
            .scroll_all(build_filter(filters), json!(true), false)
            .await?;

        let mut documents: Vec<Document> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for payload in points.into_iter().filter_map(|p| p.payload.and_then(parse_payload)) {
            match positions.get(&payload.document_id) {
                Some(&i) => documents[i].chunk_count += 1,
                None => {
                    positions.insert(payload.document_id.clone(), documents.len());
                    documents.push(payload.into_document(1));
                }
            }
        }

        Ok(documents)
    }

    async fn query_points(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_collection().await?;

        let mut body = json!({
            "vector": query_embedding,
            "limit": options.effective_top_k(),
            "score_threshold": options.min_score,
            "with_payload": true,
        });
        if let Some(filter) = build_filter(&options.filters) {
            body["filter"] = filter;
        }

        let scored: Vec<ScoredPoint> = self
            .request("search", Method::POST, self.points_url("/search"), Some(&body))
            .await?;

        Ok(scored
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload.and_then(parse_payload)?;
                Some(SearchHit {
                    text: payload.text,
                    score: point.score,
                    metadata: ChunkMetadata {
                        document_id: payload.document_id,
                        chunk_index: payload.chunk_index,
                        document: payload.metadata,
                    },
                })
            })
            .collect())
    }

    async fn collect_stats(&self) -> Result<StoreStats> {
        self.ensure_collection().await?;

        let info: CollectionInfo = self
            .request("collection info", Method::GET, self.collection_url(), None)
            .await?;

        let points = self
            .scroll_all(None, json!(["documentId"]), false)
            .await?;
        let documents: HashSet<String> = points
            .into_iter()
            .filter_map(|p| p.payload)
            .filter_map(|mut payload| match payload.remove("documentId") {
                Some(Value::String(id)) => Some(id),
                _ => None,
            })
            .collect();

        Ok(StoreStats {
            document_count: documents.len(),
            chunk_count: info.points_count.unwrap_or(0),
            vector_dimension: Some(self.config.vector_size),
        })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn upsert_document(
        &self,
        document_id: &str,
        mut metadata: DocumentMetadata,
        chunks: Vec<Chunk>,
    ) -> Result<UpsertOutcome> {
        self.ensure_collection().await?;
        metadata.strip_reserved_fields();
        let chunks = dedupe_chunks(chunks);
        let now = Utc::now();

        let existing = self.first_payload(document_id).await?;
        let status = match existing {
            Some(_) => UpsertStatus::Updated,
            None => UpsertStatus::Created,
        };
        let created_at = existing.and_then(|p| p.created_at).unwrap_or(now);

        // Filter-based delete: the old version may have had more chunks
        self.delete_points(&document_filter(document_id)).await?;

        for batch in chunks.chunks(UPSERT_BATCH_SIZE) {
            let points = batch
                .iter()
                .map(|chunk| -> Result<Value> {
                    let payload = PointPayload {
                        document_id: document_id.to_string(),
                        chunk_index: chunk.chunk_index,
                        text: chunk.text.clone(),
                        created_at: Some(created_at),
                        updated_at: Some(now),
                        metadata: metadata.clone(),
                    };
                    Ok(json!({
                        "id": derive_point_id(document_id, chunk.chunk_index),
                        "vector": chunk.embedding,
                        "payload": serde_json::to_value(payload)?,
                    }))
                })
                .collect::<Result<Vec<Value>>>()?;

            let _: Value = self
                .request(
                    "upsert",
                    Method::PUT,
                    self.points_url("?wait=true"),
                    Some(&json!({ "points": points })),
                )
                .await?;
        }

        tracing::debug!(document_id, chunk_count = chunks.len(), %status, "Qdrant upsert");

        Ok(UpsertOutcome {
            document_id: document_id.to_string(),
            chunk_count: chunks.len(),
            status,
        })
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        match self.query_points(query_embedding, options).await {
            Ok(hits) => Ok(hits),
            Err(e) => {
                tracing::warn!(error = %e, "Qdrant search failed, returning no results");
                Ok(Vec::new())
            }
        }
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        match self.fetch_document(document_id).await {
            Ok(document) => Ok(document),
            Err(e) => {
                tracing::warn!(document_id, error = %e, "Qdrant document lookup failed");
                Ok(None)
            }
        }
    }

    async fn list_documents(&self, filters: &SearchFilters) -> Result<Vec<Document>> {
        match self.collect_documents(filters).await {
            Ok(documents) => Ok(documents),
            Err(e) => {
                tracing::warn!(error = %e, "Qdrant document listing failed, returning none");
                Ok(Vec::new())
            }
        }
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        self.ensure_collection().await?;

        let filter = document_filter(document_id);
        if self.count_points(&filter).await? == 0 {
            return Ok(false);
        }

        self.delete_points(&filter).await?;
        Ok(true)
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        match self.collect_stats().await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                tracing::warn!(error = %e, "Qdrant stats unavailable");
                Ok(StoreStats {
                    vector_dimension: Some(self.config.vector_size),
                    ..Default::default()
                })
            }
        }
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.config.health_timeout())
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Qdrant health check failed");
                false
            }
        }
    }

    async fn export_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        self.ensure_collection().await?;

        let points = self
            .scroll_all(
                Some(document_filter(document_id)),
                json!(["chunkIndex", "text"]),
                true,
            )
            .await?;

        let mut chunks = Vec::with_capacity(points.len());
        for point in points {
            let embedding = point
                .vector
                .and_then(|v| serde_json::from_value::<Vec<f32>>(v).ok())
                .ok_or_else(|| StoreError::PartialDataLoss {
                    document_id: document_id.to_string(),
                    reason: "point returned without a plain vector".to_string(),
                })?;
            let mut payload = point.payload.unwrap_or_default();
            let chunk_index = payload
                .get("chunkIndex")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok())
                .ok_or_else(|| StoreError::PartialDataLoss {
                    document_id: document_id.to_string(),
                    reason: format!(
                        "point has a missing or out-of-range chunkIndex: {:?}",
                        payload.get("chunkIndex")
                    ),
                })?;

            chunks.push(Chunk {
                chunk_index,
                text: match payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => String::new(),
                },
                embedding,
            });
        }

        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }
}

// ============================================================================
// Filters and payloads
// ============================================================================

/// Translate search filters into a Qdrant `must` filter
fn build_filter(filters: &SearchFilters) -> Option<Value> {
    let mut must = Vec::new();

    if let Some(source) = &filters.source {
        must.push(json!({ "key": "source", "match": { "value": source } }));
    }
    if !filters.tags.is_empty() {
        must.push(json!({ "key": "tags", "match": { "any": filters.tags } }));
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn document_filter(document_id: &str) -> Value {
    json!({ "must": [{ "key": "documentId", "match": { "value": document_id } }] })
}

/// Payload stored with each point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointPayload {
    document_id: String,
    #[serde(default)]
    chunk_index: u32,
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    metadata: DocumentMetadata,
}

impl PointPayload {
    fn into_document(self, chunk_count: usize) -> Document {
        Document {
            document_id: self.document_id,
            metadata: self.metadata,
            chunk_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn parse_payload(payload: serde_json::Map<String, Value>) -> Option<PointPayload> {
    serde_json::from_value(Value::Object(payload))
        .map_err(|e| tracing::debug!(error = %e, "Skipping point with unreadable payload"))
        .ok()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ScrollPage {
    points: Vec<RetrievedPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RetrievedPoint {
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    vector: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: Option<usize>,
}

fn transport_error(operation: &str, err: reqwest::Error) -> StoreError {
    StoreError::Transport(format!("Qdrant {operation} request failed: {err}"))
}

async fn upstream_error(operation: &str, response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::UpstreamRequestFailed {
        operation: operation.to_string(),
        status,
        body,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_empty() {
        assert!(build_filter(&SearchFilters::none()).is_none());
    }

    #[test]
    fn test_build_filter_source_and_tags() {
        let filter = build_filter(
            &SearchFilters::none()
                .with_source("wiki")
                .with_tags(["a", "b"]),
        )
        .unwrap();

        assert_eq!(
            filter,
            json!({
                "must": [
                    { "key": "source", "match": { "value": "wiki" } },
                    { "key": "tags", "match": { "any": ["a", "b"] } }
                ]
            })
        );
    }

    #[test]
    fn test_payload_round_trip_shape() {
        let payload = PointPayload {
            document_id: "doc1".to_string(),
            chunk_index: 2,
            text: "hello".to_string(),
            created_at: None,
            updated_at: None,
            metadata: DocumentMetadata::new()
                .with_title("Greeting")
                .with_tag("demo")
                .with_field("lang", "en"),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["documentId"], "doc1");
        assert_eq!(value["chunkIndex"], 2);
        assert_eq!(value["title"], "Greeting");
        assert_eq!(value["tags"], json!(["demo"]));
        assert_eq!(value["lang"], "en");

        let Value::Object(map) = value else {
            panic!("payload should serialize to an object");
        };
        let parsed = parse_payload(map).unwrap();
        assert_eq!(parsed.document_id, "doc1");
        assert_eq!(parsed.metadata.extra.get("lang"), Some(&json!("en")));
        assert!(!parsed.metadata.extra.contains_key("text"));
    }

    #[test]
    fn test_parse_payload_requires_document_id() {
        let map = json!({ "text": "orphan" });
        let Value::Object(map) = map else { unreachable!() };
        assert!(parse_payload(map).is_none());
    }

    #[test]
    fn test_points_url() {
        let store = QdrantStore::new(QdrantConfig::new("http://localhost:6333/", "chunks")).unwrap();
        assert_eq!(
            store.points_url("/scroll"),
            "http://localhost:6333/collections/chunks/points/scroll"
        );
        assert_eq!(
            store.points_url("?wait=true"),
            "http://localhost:6333/collections/chunks/points?wait=true"
        );
    }
}
