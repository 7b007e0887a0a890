//! Layered configuration: hardcoded defaults overridable by environment variables.

use crate::error::{MemsieveError, Result};

/// Every tunable named in the spec, defaulted and overridable via `MEMSIEVE_*` env vars.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_batch_size: usize,
    pub embedding_model: String,
    pub rerank_overfetch: usize,
    pub extraction_concurrency: usize,
    pub max_global_extractions: usize,
    pub vector_weight: f32,
    pub bm25_weight: f32,
    pub max_graph_entities: usize,
    pub max_graph_relationships: usize,
    pub snapshot_root: String,
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 1600,
            chunk_overlap: 320,
            embedding_batch_size: 100,
            embedding_model: "default-embedding-model".to_string(),
            rerank_overfetch: 40,
            extraction_concurrency: 10,
            max_global_extractions: 300,
            vector_weight: 0.7,
            bm25_weight: 0.3,
            max_graph_entities: 10,
            max_graph_relationships: 20,
            snapshot_root: "./.memsieve".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Start from defaults, then apply any `MEMSIEVE_*` environment overrides present.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MEMSIEVE_CHUNK_SIZE") {
            if let Ok(n) = val.parse() {
                config.chunk_size = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_CHUNK_OVERLAP") {
            if let Ok(n) = val.parse() {
                config.chunk_overlap = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_EMBEDDING_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                config.embedding_batch_size = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_EMBEDDING_MODEL") {
            config.embedding_model = val;
        }
        if let Ok(val) = std::env::var("MEMSIEVE_RERANK_OVERFETCH") {
            if let Ok(n) = val.parse() {
                config.rerank_overfetch = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_EXTRACTION_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.extraction_concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_MAX_GLOBAL_EXTRACTIONS") {
            if let Ok(n) = val.parse() {
                config.max_global_extractions = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_VECTOR_WEIGHT") {
            if let Ok(n) = val.parse() {
                config.vector_weight = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_BM25_WEIGHT") {
            if let Ok(n) = val.parse() {
                config.bm25_weight = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_MAX_GRAPH_ENTITIES") {
            if let Ok(n) = val.parse() {
                config.max_graph_entities = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_MAX_GRAPH_RELATIONSHIPS") {
            if let Ok(n) = val.parse() {
                config.max_graph_relationships = n;
            }
        }
        if let Ok(val) = std::env::var("MEMSIEVE_SNAPSHOT_ROOT") {
            config.snapshot_root = val;
        }
        if let Ok(val) = std::env::var("MEMSIEVE_API_KEY") {
            config.api_key = Some(val);
        }

        config
    }

    /// Validate invariants that the spec calls out explicitly (fusion weights sum to 1).
    pub fn validate(&self) -> Result<()> {
        if (self.vector_weight + self.bm25_weight - 1.0).abs() > 1e-3 {
            return Err(MemsieveError::Config(format!(
                "vector_weight ({}) + bm25_weight ({}) must sum to 1.0",
                self.vector_weight, self.bm25_weight
            )));
        }
        Ok(())
    }

    /// Mirrors the provider surface's `initialize(config)`: requires an API key.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| MemsieveError::Config("missing API key".to_string()))
    }
}
