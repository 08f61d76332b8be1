//! Store selection
//!
//! Picks a backend from an explicit type, the configuration, or the
//! `VECTOR_STORE_TYPE` environment default, in that order. Unknown types
//! fall back to the in-memory store with a warning.

use docvec_core::{Result, StoreConfig, StoreError, VectorStore};
use std::sync::Arc;

use crate::{InMemoryStore, QdrantStore};

/// Store type used when nothing else is configured
pub const DEFAULT_STORE_TYPE: &str = "memory";

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Qdrant,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Qdrant => write!(f, "qdrant"),
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(StoreError::Configuration(format!(
                "Unknown vector store type: {s}"
            ))),
        }
    }
}

/// Resolve the requested store type token.
///
/// Order: explicit argument, `config.store_type`, environment default,
/// then `"memory"`. Blank values are skipped.
pub fn resolve_store_type(
    explicit: Option<&str>,
    config: &StoreConfig,
    env_default: Option<&str>,
) -> String {
    [explicit, config.store_type.as_deref(), env_default]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STORE_TYPE)
        .to_string()
}

/// Create a vector store from a type token and configuration
pub fn create_store(
    store_type: Option<&str>,
    config: &StoreConfig,
) -> Result<Arc<dyn VectorStore>> {
    let env_default = std::env::var("VECTOR_STORE_TYPE").ok();
    let requested = resolve_store_type(store_type, config, env_default.as_deref());

    tracing::info!(store_type = %requested, "Creating vector store");

    let kind = requested.parse::<StoreKind>().unwrap_or_else(|_| {
        tracing::warn!(
            store_type = %requested,
            "Unknown vector store type, falling back to in-memory"
        );
        StoreKind::Memory
    });

    build_store(kind, config)
}

/// Construct a specific backend
pub fn build_store(kind: StoreKind, config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreKind::Qdrant => Ok(Arc::new(QdrantStore::new(config.qdrant.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("In-Memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("QDRANT".parse::<StoreKind>().unwrap(), StoreKind::Qdrant);
        assert!("pinecone".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_resolution_order() {
        let mut config = StoreConfig::default();
        assert_eq!(resolve_store_type(None, &config, None), "memory");
        assert_eq!(resolve_store_type(None, &config, Some("qdrant")), "qdrant");

        config.store_type = Some("in-memory".to_string());
        assert_eq!(resolve_store_type(None, &config, Some("qdrant")), "in-memory");
        assert_eq!(
            resolve_store_type(Some("qdrant"), &config, Some("memory")),
            "qdrant"
        );
        assert_eq!(resolve_store_type(Some("  "), &config, None), "in-memory");
    }

    #[test]
    fn test_unknown_type_falls_back_to_memory() {
        let store = create_store(Some("chroma"), &StoreConfig::default()).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_explicit_types() {
        let config = StoreConfig::default();
        assert_eq!(create_store(Some("memory"), &config).unwrap().name(), "memory");
        assert_eq!(create_store(Some("qdrant"), &config).unwrap().name(), "qdrant");
    }
}
