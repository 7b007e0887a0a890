//! Core data model: sessions, chunks, entity graph nodes/edges, and results.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single message within an ingested session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speaker: String,
    pub timestamp: Option<String>,
    pub content: String,
}

/// An ordered conversation handed to `ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Canonical ISO date (`YYYY-MM-DD`) the session is anchored to.
    pub date: Option<String>,
}

/// A contiguous piece of extracted-memory text with its embedding.
///
/// `(container_tag, id)` is unique within the engine; `id` is deterministic:
/// `"{container_tag}_{session_id}_{chunk_index}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub container_tag: String,
    pub content: String,
    pub session_id: String,
    pub chunk_index: usize,
    pub embedding: Vec<f32>,
    pub date: Option<String>,
    pub event_date: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    #[must_use]
    pub fn deterministic_id(container_tag: &str, session_id: &str, chunk_index: usize) -> String {
        format!("{container_tag}_{session_id}_{chunk_index}")
    }
}

/// A named entity tracked within one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityNode {
    pub name: String,
    pub entity_type: String,
    pub summary: String,
    pub session_ids: HashSet<String>,
}

/// A directed, labeled edge between two entity names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RelationshipEdge {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub date: Option<String>,
    pub session_id: String,
}

impl RelationshipEdge {
    /// The dedup key per the entity graph spec: `source|relation|target`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.source, self.relation, self.target)
    }
}

/// A single retrieval hit, combining hybrid scores and optional reranker/graph fields.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    pub score: f32,
    pub vector_score: f32,
    pub bm25_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    pub session_id: String,
    pub chunk_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub result_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl SearchResult {
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, vector_score: f32, bm25_score: f32, score: f32) -> Self {
        Self {
            content: chunk.content.clone(),
            score,
            vector_score,
            bm25_score,
            rerank_score: None,
            session_id: chunk.session_id.clone(),
            chunk_index: chunk.chunk_index,
            date: chunk.date.clone(),
            event_date: chunk.event_date.clone(),
            metadata: if chunk.metadata.is_empty() {
                None
            } else {
                Some(chunk.metadata.clone())
            },
            result_type: None,
            name: None,
            entity_type: None,
            source: None,
            target: None,
            relation: None,
        }
    }

    #[must_use]
    pub fn entity_pseudo_result(node: &EntityNode) -> Self {
        Self {
            content: node.summary.clone(),
            score: 0.0,
            vector_score: 0.0,
            bm25_score: 0.0,
            rerank_score: None,
            session_id: String::new(),
            chunk_index: 0,
            date: None,
            event_date: None,
            metadata: None,
            result_type: Some("entity".to_string()),
            name: Some(node.name.clone()),
            entity_type: Some(node.entity_type.clone()),
            source: None,
            target: None,
            relation: None,
        }
    }

    #[must_use]
    pub fn relationship_pseudo_result(edge: &RelationshipEdge) -> Self {
        Self {
            content: format!("{} {} {}", edge.source, edge.relation, edge.target),
            score: 0.0,
            vector_score: 0.0,
            bm25_score: 0.0,
            rerank_score: None,
            session_id: edge.session_id.clone(),
            chunk_index: 0,
            date: edge.date.clone(),
            event_date: None,
            metadata: None,
            result_type: Some("relationship".to_string()),
            name: None,
            entity_type: None,
            source: Some(edge.source.clone()),
            target: Some(edge.target.clone()),
            relation: Some(edge.relation.clone()),
        }
    }
}

/// Container-scoped snapshot of all persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContainerSnapshot {
    pub chunks: Vec<Chunk>,
    pub nodes: Vec<EntityNode>,
    pub edges: Vec<RelationshipEdge>,
}
