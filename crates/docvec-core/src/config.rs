//! docvec Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Store selection and backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Store type token ("memory", "in-memory", "qdrant")
    pub store_type: Option<String>,

    /// Remote vector database settings
    pub qdrant: QdrantConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl StoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// `VECTOR_STORE_TYPE` is not read here: the factory uses it as the
    /// fallback after `store_type`.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // QDRANT_URL wins over the older QDRANT_HOST name
        if let Ok(url) = std::env::var("QDRANT_URL").or_else(|_| std::env::var("QDRANT_HOST")) {
            self.qdrant.url = url;
        }
        if let Ok(collection) = std::env::var("QDRANT_COLLECTION") {
            self.qdrant.collection = collection;
        }
        if let Ok(size) = std::env::var("QDRANT_VECTOR_SIZE") {
            self.qdrant.vector_size = parse_env("QDRANT_VECTOR_SIZE", size)?;
        }
        if let Ok(secs) = std::env::var("QDRANT_TIMEOUT_SECS") {
            self.qdrant.timeout_secs = parse_env("QDRANT_TIMEOUT_SECS", secs)?;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Remote vector database (Qdrant REST API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Base URL of the REST API
    pub url: String,

    /// Collection holding chunk points
    pub collection: String,

    /// Vector dimension (must match embedding model)
    pub vector_size: usize,

    /// Points before the server starts building its index
    pub indexing_threshold: u64,

    /// Timeout for every request, in seconds
    pub timeout_secs: u64,

    /// Timeout for the liveness probe, in milliseconds
    pub health_timeout_ms: u64,

    /// Points fetched per scroll page
    pub scroll_page_size: usize,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "docvec_chunks".to_string(),
            vector_size: 768, // nomic-embed-text
            indexing_threshold: 10_000,
            timeout_secs: 30,
            health_timeout_ms: 2_000,
            scroll_page_size: 1_000,
        }
    }
}

impl QdrantConfig {
    /// Create a config pointing at a URL and collection
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Set the vector dimension
    pub fn with_vector_size(mut self, vector_size: usize) -> Self {
        self.vector_size = vector_size;
        self
    }

    /// Set the scroll page size
    pub fn with_scroll_page_size(mut self, page_size: usize) -> Self {
        self.scroll_page_size = page_size;
        self
    }

    /// Set the liveness probe timeout
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.store_type.is_none());
        assert_eq!(config.qdrant.url, "http://localhost:6333");
        assert_eq!(config.qdrant.vector_size, 768);
        assert_eq!(config.qdrant.health_timeout(), Duration::from_secs(2));
        assert_eq!(config.qdrant.scroll_page_size, 1000);
    }

    #[test]
    fn test_partial_toml() {
        let config: StoreConfig = toml::from_str(
            r#"
            store_type = "qdrant"

            [qdrant]
            url = "http://vectors:6333"
            vector_size = 384
            "#,
        )
        .unwrap();

        assert_eq!(config.store_type.as_deref(), Some("qdrant"));
        assert_eq!(config.qdrant.url, "http://vectors:6333");
        assert_eq!(config.qdrant.vector_size, 384);
        assert_eq!(config.qdrant.collection, "docvec_chunks");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_missing() {
        let err = StoreConfig::from_file("/nonexistent/docvec.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_file_store_type_beats_environment_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docvec.toml");
        std::fs::write(&path, "store_type = \"qdrant\"\n").unwrap();

        std::env::set_var("VECTOR_STORE_TYPE", "memory");
        let config = StoreConfig::from_file(&path)
            .and_then(StoreConfig::with_env_override)
            .unwrap();
        std::env::remove_var("VECTOR_STORE_TYPE");

        assert_eq!(config.store_type.as_deref(), Some("qdrant"));
    }

    #[test]
    fn test_health_timeout_saturates() {
        let config = QdrantConfig::default().with_health_timeout(Duration::MAX);
        assert_eq!(config.health_timeout_ms, u64::MAX);

        let config = QdrantConfig::default().with_health_timeout(Duration::from_millis(250));
        assert_eq!(config.health_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_env_invalid() {
        let err = parse_env::<usize>("QDRANT_VECTOR_SIZE", "big".to_string()).unwrap_err();
        assert!(err.to_string().contains("QDRANT_VECTOR_SIZE"));
    }
}
