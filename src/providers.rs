//! External collaborator contracts: embedder, extraction LLM, reranker LLM.
//!
//! These are pure text/vector in-out boundaries — the prompts and model
//! weights behind them are out of scope; only the call shape matters here.

use async_trait::async_trait;

/// Text -> vector embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, model: &str, text: &str) -> anyhow::Result<Vec<f32>>;
    async fn embed_many(&self, model: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Text -> text generation call used for memory extraction.
#[async_trait]
pub trait ExtractionLlm: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}

/// Text -> text generation call used for reranking.
#[async_trait]
pub trait RerankerLlm: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> anyhow::Result<String>;
}
