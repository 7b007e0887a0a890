//! Flat cosine-similarity index over chunk embeddings.
//!
//! Exact (not approximate) top-K — sufficient for the per-container scale
//! this core targets; swap for an ANN structure behind the same surface if
//! a container grows large enough to need one.

use crate::types::Chunk;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct VectorIndex {
    chunks: HashMap<String, Chunk>,
}

impl VectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.id.clone(), chunk);
    }

    pub fn remove(&mut self, id: &str) {
        self.chunks.remove(id);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    #[must_use]
    pub fn all_chunks(&self) -> Vec<&Chunk> {
        self.chunks.values().collect()
    }

    /// Top-`limit` chunks by cosine similarity to `query_embedding`.
    #[must_use]
    pub fn top_k(&self, query_embedding: &[f32], limit: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .chunks
            .values()
            .map(|c| (c.id.clone(), cosine_similarity(query_embedding, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
