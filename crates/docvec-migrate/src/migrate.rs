//! Export, import and direct migration primitives
//!
//! Author: hephaex@gmail.com

use docvec_core::{Document, Result, SearchFilters, StoreError, VectorStore};
use docvec_vector::StoreKind;
use std::path::Path;

use crate::snapshot::{Snapshot, SnapshotRecord};

// ============================================================================
// Reports
// ============================================================================

/// Result of processing a single document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Succeeded,
    /// Written, but without some of its data
    Partial(String),
    Failed(String),
}

/// Outcome for one document id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub document_id: String,
    pub outcome: DocumentOutcome,
}

/// Aggregate outcome of an export, import or migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Documents fully processed
    pub succeeded: usize,
    /// Documents attempted
    pub total: usize,
    /// Per-document outcomes, in processing order
    pub outcomes: Vec<DocumentReport>,
}

impl MigrationReport {
    fn record(&mut self, document_id: impl Into<String>, outcome: DocumentOutcome) {
        self.total += 1;
        if outcome == DocumentOutcome::Succeeded {
            self.succeeded += 1;
        }
        self.outcomes.push(DocumentReport {
            document_id: document_id.into(),
            outcome,
        });
    }

    /// Documents that were not fully processed
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    /// True when every document succeeded
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }

    /// Outcome for a document id
    pub fn outcome(&self, document_id: &str) -> Option<&DocumentOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.document_id == document_id)
            .map(|r| &r.outcome)
    }
}

// ============================================================================
// Preconditions
// ============================================================================

/// Fail with `BackendUnavailable` unless the store passes its health check
pub async fn ensure_healthy(store: &dyn VectorStore, role: &str) -> Result<()> {
    if store.health_check().await {
        Ok(())
    } else {
        Err(StoreError::BackendUnavailable(format!(
            "{role} store ({}) is not healthy",
            store.name()
        )))
    }
}

/// Reject migrating a store instance onto itself
pub fn ensure_distinct(source: &dyn VectorStore, target: &dyn VectorStore) -> Result<()> {
    let source_ptr = source as *const dyn VectorStore as *const ();
    let target_ptr = target as *const dyn VectorStore as *const ();

    if std::ptr::eq(source_ptr, target_ptr) {
        return Err(StoreError::Configuration(
            "Source and destination stores cannot be the same".to_string(),
        ));
    }
    Ok(())
}

/// Reject source and destination type tokens naming the same backend.
///
/// Unknown tokens count as the in-memory store, matching the factory fallback.
pub fn ensure_distinct_types(from: &str, to: &str) -> Result<()> {
    let kind = |token: &str| token.parse::<StoreKind>().unwrap_or(StoreKind::Memory);

    if kind(from) == kind(to) {
        return Err(StoreError::Configuration(format!(
            "Source ({from}) and destination ({to}) stores cannot be the same"
        )));
    }
    Ok(())
}

// ============================================================================
// Primitives
// ============================================================================

/// Export every document of `store` into a snapshot.
///
/// Documents whose chunks cannot be exported are kept with an empty chunk
/// list and reported as partial. Other per-document failures leave the
/// document out of the snapshot.
pub async fn export_snapshot(store: &dyn VectorStore) -> Result<(Snapshot, MigrationReport)> {
    tracing::info!(store = store.name(), "Exporting documents");

    let documents = store.list_documents(&SearchFilters::none()).await?;
    let mut records = Vec::with_capacity(documents.len());
    let mut report = MigrationReport::default();

    for document in documents {
        let id = document.document_id.clone();
        tracing::info!(document_id = %id, title = ?document.metadata.title, "Exporting document");

        let (chunks, outcome) = match store.export_chunks(&id).await {
            Ok(chunks) => (chunks, DocumentOutcome::Succeeded),
            Err(StoreError::PartialDataLoss { reason, .. }) => {
                tracing::warn!(
                    document_id = %id,
                    reason = %reason,
                    "Cannot extract embeddings, export will be incomplete"
                );
                (Vec::new(), DocumentOutcome::Partial(reason))
            }
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to export document");
                report.record(id, DocumentOutcome::Failed(e.to_string()));
                continue;
            }
        };

        match SnapshotRecord::new(&document, chunks) {
            Ok(record) => {
                records.push(record);
                report.record(id, outcome);
            }
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to export document");
                report.record(id, DocumentOutcome::Failed(e.to_string()));
            }
        }
    }

    let snapshot = Snapshot::new(records);
    tracing::info!(
        succeeded = report.succeeded,
        total = report.total,
        "Export completed"
    );

    Ok((snapshot, report))
}

/// Upsert every snapshot record into `store`, one document at a time
pub async fn import_snapshot(store: &dyn VectorStore, snapshot: &Snapshot) -> MigrationReport {
    tracing::info!(
        store = store.name(),
        version = %snapshot.version,
        document_count = snapshot.documents.len(),
        "Importing documents"
    );

    let mut report = MigrationReport::default();

    for (position, record) in snapshot.documents.iter().enumerate() {
        let label = record
            .document_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("<record {position}>"));

        match import_record(store, record).await {
            Ok(document) => {
                tracing::info!(
                    document_id = %label,
                    title = ?document.metadata.title,
                    "Imported document"
                );
                report.record(label, DocumentOutcome::Succeeded);
            }
            Err(e) => {
                tracing::error!(document_id = %label, error = %e, "Failed to import document");
                report.record(label, DocumentOutcome::Failed(e.to_string()));
            }
        }
    }

    tracing::info!(
        imported = report.succeeded,
        total = report.total,
        "Import completed"
    );
    report
}

async fn import_record(store: &dyn VectorStore, record: &SnapshotRecord) -> Result<Document> {
    if record.document_id().is_none() {
        return Err(StoreError::Snapshot(
            "record metadata has no documentId".to_string(),
        ));
    }

    let document = record.document()?;
    let chunks = record.chunks()?;
    store
        .upsert_document(&document.document_id, document.metadata.clone(), chunks)
        .await?;
    Ok(document)
}

/// Copy every document from `source` into `target`.
///
/// A document whose chunks cannot be exported is a failure and nothing is
/// written for it.
pub async fn migrate_documents(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
) -> Result<MigrationReport> {
    tracing::info!(from = source.name(), to = target.name(), "Starting migration");

    let documents = source.list_documents(&SearchFilters::none()).await?;
    tracing::info!(count = documents.len(), "Documents to migrate");

    let mut report = MigrationReport::default();

    for document in documents {
        let id = document.document_id.clone();
        tracing::info!(document_id = %id, title = ?document.metadata.title, "Migrating document");

        let result = async {
            let chunks = source.export_chunks(&id).await?;
            target
                .upsert_document(&id, document.metadata.clone(), chunks)
                .await
        }
        .await;

        match result {
            Ok(_) => {
                tracing::info!(document_id = %id, "Document migrated successfully");
                report.record(id, DocumentOutcome::Succeeded);
            }
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to migrate document");
                report.record(id, DocumentOutcome::Failed(e.to_string()));
            }
        }
    }

    tracing::info!(
        migrated = report.succeeded,
        total = report.total,
        "Migration completed"
    );
    Ok(report)
}

// ============================================================================
// Run modes
// ============================================================================

/// Health-check `store`, export it and write the snapshot to `path`
pub async fn run_export(
    store: &dyn VectorStore,
    path: impl AsRef<Path>,
) -> Result<MigrationReport> {
    let path = path.as_ref();
    ensure_healthy(store, "Source").await?;

    let (snapshot, report) = export_snapshot(store).await?;
    snapshot.write_to(path)?;

    tracing::info!(
        path = %path.display(),
        document_count = snapshot.document_count,
        "Snapshot written"
    );
    Ok(report)
}

/// Health-check `store` and import the snapshot at `path` into it
pub async fn run_import(
    store: &dyn VectorStore,
    path: impl AsRef<Path>,
) -> Result<MigrationReport> {
    let path = path.as_ref();
    ensure_healthy(store, "Target").await?;

    let snapshot = Snapshot::read_from(path)?;
    tracing::info!(
        path = %path.display(),
        version = %snapshot.version,
        document_count = snapshot.document_count,
        "Import data loaded"
    );

    Ok(import_snapshot(store, &snapshot).await)
}

/// Check preconditions on both stores, then migrate
pub async fn run_migration(
    source: &dyn VectorStore,
    target: &dyn VectorStore,
) -> Result<MigrationReport> {
    ensure_distinct(source, target)?;
    ensure_healthy(source, "Source").await?;
    ensure_healthy(target, "Target").await?;

    migrate_documents(source, target).await
}
