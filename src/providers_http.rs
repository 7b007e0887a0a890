//! HTTP-backed implementations of the embedder/extraction/reranker contracts.
//!
//! These talk to an OpenAI-compatible API surface (embeddings + chat
//! completions endpoints) the way the teacher's `HttpSemanticGen`/
//! `HttpLexicalGen` talk to their Python index services: a thin
//! `reqwest::Client` wrapper, a request/response struct pair per call, and
//! `anyhow::Context` on every fallible step.

use crate::providers::{Embedder, ExtractionLlm, RerankerLlm};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Shared HTTP client plumbing: base URL plus bearer token.
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let client = reqwest::Client::builder()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                if let Ok(value) =
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                headers
            })
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    One(&'a str),
    Many(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Calls `POST {base_url}/embeddings`.
pub struct HttpEmbedder {
    http: HttpClient,
}

impl HttpEmbedder {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let req = EmbeddingRequest {
            model,
            input: EmbeddingInput::One(text),
        };
        let resp: EmbeddingResponse = self
            .http
            .client
            .post(format!("{}/embeddings", self.http.base_url))
            .json(&req)
            .send()
            .await
            .context("sending embed request")?
            .error_for_status()
            .context("embed request returned error status")?
            .json()
            .await
            .context("parsing embed response")?;
        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("embed response had no data")
    }

    async fn embed_many(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let req = EmbeddingRequest {
            model,
            input: EmbeddingInput::Many(texts),
        };
        let resp: EmbeddingResponse = self
            .http
            .client
            .post(format!("{}/embeddings", self.http.base_url))
            .json(&req)
            .send()
            .await
            .context("sending batch embed request")?
            .error_for_status()
            .context("batch embed request returned error status")?
            .json()
            .await
            .context("parsing batch embed response")?;
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

async fn chat_complete(http: &HttpClient, model: &str, prompt: &str) -> Result<String> {
    let req = ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
    };
    let resp: ChatResponse = http
        .client
        .post(format!("{}/chat/completions", http.base_url))
        .json(&req)
        .send()
        .await
        .context("sending chat completion request")?
        .error_for_status()
        .context("chat completion request returned error status")?
        .json()
        .await
        .context("parsing chat completion response")?;
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .context("chat completion response had no choices")
}

/// Calls `POST {base_url}/chat/completions` for memory extraction.
pub struct HttpExtractionLlm {
    http: HttpClient,
}

impl HttpExtractionLlm {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ExtractionLlm for HttpExtractionLlm {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        chat_complete(&self.http, model, prompt).await
    }
}

/// Calls `POST {base_url}/chat/completions` for rerank scoring.
pub struct HttpRerankerLlm {
    http: HttpClient,
}

impl HttpRerankerLlm {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RerankerLlm for HttpRerankerLlm {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        chat_complete(&self.http, model, prompt).await
    }
}
