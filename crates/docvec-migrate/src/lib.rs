//! docvec Migrate - Moving document collections between stores
//!
//! Three modes built on the same primitives:
//! - export: store -> portable JSON snapshot
//! - import: snapshot -> store
//! - direct migration: store -> store
//!
//! Documents are processed one at a time. A failure on one document is
//! logged and reported but never stops the run; only precondition failures
//! (unhealthy or identical stores) abort before any work starts.

pub mod migrate;
pub mod snapshot;

pub use migrate::{
    ensure_distinct, ensure_distinct_types, ensure_healthy, export_snapshot, import_snapshot,
    migrate_documents, run_export, run_import, run_migration, DocumentOutcome, DocumentReport,
    MigrationReport,
};
pub use snapshot::{Snapshot, SnapshotRecord, SNAPSHOT_VERSION};
