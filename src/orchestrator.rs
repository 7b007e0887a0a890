//! Ingest/search orchestrator: ties the extraction pool, per-container lock,
//! entity graph, chunker, hybrid search engine, reranker, and snapshot store
//! into the provider surface (`ingest`/`search`/`clear`).

use crate::config::Config;
use crate::error::{MemsieveError, Result};
use crate::graph::EntityGraph;
use crate::chunker::chunk_text;
use crate::parser::parse_extraction;
use crate::persistence::SnapshotStore;
use crate::pool::ExtractionPool;
use crate::providers::{Embedder, ExtractionLlm, RerankerLlm};
use crate::reranker::rerank_results;
use crate::rwlock::ContainerLocks;
use crate::search::SearchEngine;
use crate::types::{Chunk, SearchResult, Session};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

const TRANSPORT_RETRY_ATTEMPTS: u32 = 3;
const EXTRACTION_RETRY_ATTEMPTS: u32 = 5;
/// Model identifiers for the extraction/reranker collaborators: unlike the
/// embedder, the spec leaves these unconfigured since prompt/model design
/// for those two services is out of scope.
const EXTRACTION_MODEL: &str = "default-extraction-model";
const RERANKER_MODEL: &str = "default-reranker-model";

/// One container's in-memory state. Mutated only while holding the matching
/// [`ContainerLocks`] guard; the `Mutex` here just gives interior mutability,
/// the RW contract itself lives in `ContainerLocks`.
#[derive(Default)]
struct ContainerState {
    search: SearchEngine,
    graph: EntityGraph,
}

/// Result of `ingest`: the ids of chunks written.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub document_ids: Vec<String>,
}

/// Options accepted by `search`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub container_tag: String,
    pub limit: usize,
}

pub struct MemsieveEngine {
    config: Config,
    pool: ExtractionPool,
    locks: ContainerLocks,
    containers: Mutex<HashMap<String, Arc<Mutex<ContainerState>>>>,
    extraction_cache: Mutex<HashMap<String, crate::parser::ExtractionResult>>,
    extraction_in_flight: Mutex<HashMap<String, Arc<OnceCell<crate::parser::ExtractionResult>>>>,
    embedder: Arc<dyn Embedder>,
    extraction_llm: Arc<dyn ExtractionLlm>,
    reranker_llm: Arc<dyn RerankerLlm>,
    store: Arc<dyn SnapshotStore>,
}

impl MemsieveEngine {
    #[must_use]
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        extraction_llm: Arc<dyn ExtractionLlm>,
        reranker_llm: Arc<dyn RerankerLlm>,
        store: Arc<dyn SnapshotStore>,
    ) -> Arc<Self> {
        let pool = ExtractionPool::new(config.max_global_extractions);
        Arc::new(Self {
            config,
            pool,
            locks: ContainerLocks::new(),
            containers: Mutex::new(HashMap::new()),
            extraction_cache: Mutex::new(HashMap::new()),
            extraction_in_flight: Mutex::new(HashMap::new()),
            embedder,
            extraction_llm,
            reranker_llm,
            store,
        })
    }

    async fn container(&self, tag: &str) -> Arc<Mutex<ContainerState>> {
        let mut containers = self.containers.lock().await;
        containers
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ContainerState::default())))
            .clone()
    }

    /// Extract memories for `session`, sharing one in-flight LLM call across
    /// concurrent callers for the same `sessionId` and caching the parsed
    /// result for the lifetime of the engine.
    async fn extract(&self, session: &Session) -> Result<crate::parser::ExtractionResult> {
        if let Some(cached) = self.extraction_cache.lock().await.get(&session.session_id) {
            return Ok(cached.clone());
        }

        let cell = {
            let mut in_flight = self.extraction_in_flight.lock().await;
            in_flight
                .entry(session.session_id.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let prompt = build_extraction_prompt(session);
        let result = cell
            .get_or_try_init(|| async {
                let permit = self.pool.acquire().await;
                info!(session_id = %session.session_id, "invoking extraction llm");
                let raw = self.generate_extraction_with_retry(&prompt).await?;
                drop(permit);
                Ok::<_, MemsieveError>(parse_extraction(&raw))
            })
            .await?
            .clone();

        self.extraction_cache
            .lock()
            .await
            .insert(session.session_id.clone(), result.clone());
        self.extraction_in_flight.lock().await.remove(&session.session_id);

        Ok(result)
    }

    /// Extraction calls get a longer, exponential retry than embeddings or
    /// reranking: 5 attempts, backing off `2s * 2^n` between them.
    async fn generate_extraction_with_retry(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.extraction_llm.generate(EXTRACTION_MODEL, prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < EXTRACTION_RETRY_ATTEMPTS => {
                    // 2s * 2^n, n = 0 for the first retry.
                    let delay = 2u64 * 2u64.saturating_pow(attempt - 1);
                    warn!("extraction llm call failed on attempt {attempt}: {err}");
                    tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                }
                Err(err) => {
                    error!("extraction llm call failed after {attempt} attempts: {err}");
                    return Err(MemsieveError::transport(attempt, err));
                }
            }
        }
    }

    async fn embed_batch_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.embedder.embed_many(&self.config.embedding_model, texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if attempt < TRANSPORT_RETRY_ATTEMPTS => {
                    warn!("embedding batch failed on attempt {attempt}: {err}");
                    tokio::time::sleep(std::time::Duration::from_secs(u64::from(attempt))).await;
                }
                Err(err) => {
                    error!("embedding batch failed after {attempt} attempts: {err}");
                    return Err(MemsieveError::transport(attempt, err));
                }
            }
        }
    }

    pub async fn ingest(&self, tag: &str, sessions: Vec<Session>) -> Result<IngestResult> {
        let _write_guard = self.locks.write(tag).await;
        let container = self.container(tag).await;

        let extractions: Vec<(Session, crate::parser::ExtractionResult)> = stream::iter(sessions)
            .map(|session| async move {
                let extraction = self.extract(&session).await;
                (session, extraction)
            })
            .buffer_unordered(self.config.extraction_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|(session, result)| result.map(|r| (session, r)))
            .collect::<Result<Vec<_>>>()?;

        let mut pending_chunks: Vec<Chunk> = Vec::new();
        let mut pending_texts: Vec<String> = Vec::new();

        {
            let mut state = container.lock().await;
            for (session, extraction) in &extractions {
                for entity in &extraction.entities {
                    state.graph.add_entity(
                        &entity.name,
                        &entity.entity_type,
                        &entity.summary,
                        &session.session_id,
                    );
                }
                for rel in &extraction.relationships {
                    state.graph.add_relationship(crate::types::RelationshipEdge {
                        source: rel.source.clone(),
                        relation: rel.relation.clone(),
                        target: rel.target.clone(),
                        date: rel.date.clone(),
                        session_id: session.session_id.clone(),
                    });
                }

                let memory_date = session.date.clone().unwrap_or_else(|| "unknown".to_string());
                let prefixed = format!("# Memories from {memory_date}\n\n{}", extraction.memory_text);
                let memory_lines: Vec<&str> = extraction.memory_text.lines().collect();

                let chunks = chunk_text(&prefixed, self.config.chunk_size, self.config.chunk_overlap);
                for (idx, content) in chunks.into_iter().enumerate() {
                    let event_date =
                        event_date_for_chunk(&content, &memory_lines, &extraction.event_dates);
                    let mut metadata = HashMap::new();
                    metadata.insert("memoryDate".to_string(), memory_date.clone());

                    let chunk = Chunk {
                        id: Chunk::deterministic_id(tag, &session.session_id, idx),
                        container_tag: tag.to_string(),
                        content: content.clone(),
                        session_id: session.session_id.clone(),
                        chunk_index: idx,
                        embedding: Vec::new(),
                        date: session.date.clone(),
                        event_date,
                        metadata,
                    };
                    pending_texts.push(content);
                    pending_chunks.push(chunk);
                }
            }
        }

        let mut embedded_chunks = Vec::with_capacity(pending_chunks.len());
        for (batch_chunks, batch_texts) in pending_chunks
            .chunks(self.config.embedding_batch_size.max(1))
            .zip(pending_texts.chunks(self.config.embedding_batch_size.max(1)))
        {
            let vectors = self.embed_batch_with_retry(batch_texts).await?;
            for (mut chunk, vector) in batch_chunks.iter().cloned().zip(vectors.into_iter()) {
                chunk.embedding = vector;
                embedded_chunks.push(chunk);
            }
        }

        let document_ids: Vec<String> = embedded_chunks.iter().map(|c| c.id.clone()).collect();

        {
            let mut state = container.lock().await;
            state.search.add_chunks(embedded_chunks);
        }

        if let Err(err) = self.write_snapshot(tag, &container).await {
            warn!(container = tag, "snapshot write failed: {err}");
        }

        Ok(IngestResult { document_ids })
    }

    /// Best-effort persistence: logs and returns the error rather than
    /// poisoning the in-memory state the caller already has.
    async fn write_snapshot(&self, tag: &str, container: &Arc<Mutex<ContainerState>>) -> Result<()> {
        let (chunks, nodes, edges) = {
            let state = container.lock().await;
            let chunks = state.search.snapshot_chunks();
            let nodes: Vec<_> = state.graph.all_entities();
            let edges: Vec<_> = state.graph.all_relationships();
            (chunks, nodes, edges)
        };

        self.store.save_chunks(tag, &chunks).await?;
        self.store.save_graph(tag, &nodes, &edges).await?;
        Ok(())
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let _read_guard = self.locks.read(&options.container_tag).await;
        let container = self.container(&options.container_tag).await;

        {
            let mut state = container.lock().await;
            if !state.search.has_data() {
                let loaded = self.store.load_chunks(&options.container_tag).await?;
                if !loaded.is_empty() {
                    state.search.load_chunks(loaded);
                }
                let (nodes, edges) = self.store.load_graph(&options.container_tag).await?;
                if !nodes.is_empty() || !edges.is_empty() {
                    state.graph.load(nodes, edges);
                }
            }
        }

        let query_embedding = self
            .embed_batch_with_retry(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let overfetch = options.limit.max(self.config.rerank_overfetch);

        let (mut hybrid, graph_context) = {
            let state = container.lock().await;
            let hybrid = state.search.search(
                &query_embedding,
                query,
                overfetch,
                self.config.vector_weight,
                self.config.bm25_weight,
            );
            let query_entities = state.graph.find_entities_in_query(query);
            let graph_context = state.graph.get_context(
                &query_entities,
                2,
                self.config.max_graph_entities,
                self.config.max_graph_relationships,
            );
            (hybrid, graph_context)
        };

        if hybrid.len() > options.limit {
            hybrid = rerank_results(
                self.reranker_llm.as_ref(),
                RERANKER_MODEL,
                query,
                hybrid,
                options.limit,
            )
            .await;
        }

        let mut results: Vec<SearchResult> = hybrid
            .into_iter()
            .map(|h| {
                let mut r = SearchResult::from_chunk(&h.chunk, h.vector_score, h.bm25_score, h.score);
                r.rerank_score = h.rerank_score;
                r
            })
            .collect();

        for entity in &graph_context.entities {
            results.push(SearchResult::entity_pseudo_result(entity));
        }
        for edge in &graph_context.relationships {
            results.push(SearchResult::relationship_pseudo_result(edge));
        }

        debug!(
            container = %options.container_tag,
            hits = results.len(),
            "search complete"
        );

        Ok(results)
    }

    pub async fn clear(&self, tag: &str) -> Result<()> {
        let _write_guard = self.locks.write(tag).await;
        let container = self.container(tag).await;
        {
            let mut state = container.lock().await;
            state.search.clear();
            state.graph.clear();
        }
        self.store.clear(tag).await?;
        Ok(())
    }
}

fn build_extraction_prompt(session: &Session) -> String {
    let mut prompt = String::new();
    for message in &session.messages {
        prompt.push_str(&message.speaker);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt
}

fn event_date_for_chunk(
    content: &str,
    memory_lines: &[&str],
    event_dates: &HashMap<usize, String>,
) -> Option<String> {
    event_dates
        .iter()
        .filter_map(|(idx, date)| {
            let line = memory_lines.get(*idx)?;
            let trimmed = line.trim();
            if !trimmed.is_empty() && content.contains(trimmed) {
                Some(date)
            } else {
                None
            }
        })
        .min()
        .cloned()
}
