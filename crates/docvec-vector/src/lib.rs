//! docvec Vector - Vector store backends
//!
//! Provides the concrete `VectorStore` implementations
//! (process-local memory, Qdrant over HTTP) and the factory that
//! picks one from configuration.

pub mod factory;
pub mod memory_store;
pub mod point_id;
pub mod qdrant_store;

pub use factory::{build_store, create_store, resolve_store_type, StoreKind};
pub use memory_store::InMemoryStore;
pub use point_id::derive_point_id;
pub use qdrant_store::QdrantStore;

use docvec_core::Chunk;

/// Collapse chunks sharing a `chunk_index`; the last occurrence wins,
/// keeping the position of the first.
pub(crate) fn dedupe_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut deduped: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut positions = std::collections::HashMap::with_capacity(chunks.len());

    for chunk in chunks {
        match positions.get(&chunk.chunk_index) {
            Some(&i) => deduped[i] = chunk,
            None => {
                positions.insert(chunk.chunk_index, deduped.len());
                deduped.push(chunk);
            }
        }
    }

    deduped
}
