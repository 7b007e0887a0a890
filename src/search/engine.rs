//! Per-container hybrid search: vector + lexical fusion with max-normalization.

use super::lexical_index::LexicalIndex;
use super::vector_index::VectorIndex;
use crate::types::Chunk;

/// Vector and lexical component scores for one retrieved chunk, alongside
/// the fused score.
#[derive(Debug, Clone)]
pub struct HybridScore {
    pub chunk: Chunk,
    pub vector_score: f32,
    pub bm25_score: f32,
    pub score: f32,
    pub rerank_score: Option<f32>,
}

/// One container's vector + lexical indices, updated atomically together.
#[derive(Debug, Default)]
pub struct SearchEngine {
    vector: VectorIndex,
    lexical: LexicalIndex,
}

impl SearchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert by `id`: old content/embedding are replaced on repeat ingest.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            self.lexical.upsert(&chunk.id, &chunk.content);
            self.vector.upsert(chunk);
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.vector.len()
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.vector.is_empty()
    }

    pub fn clear(&mut self) {
        self.vector.clear();
        self.lexical.clear();
    }

    #[must_use]
    pub fn snapshot_chunks(&self) -> Vec<Chunk> {
        self.vector.all_chunks().into_iter().cloned().collect()
    }

    pub fn load_chunks(&mut self, chunks: Vec<Chunk>) {
        self.add_chunks(chunks);
    }

    /// Fetch top-`limit` by cosine similarity, score the same ids
    /// lexically, normalize lexical scores by the max within this result
    /// set, and fuse with `vector_weight`/`bm25_weight`.
    #[must_use]
    pub fn search(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        limit: usize,
        vector_weight: f32,
        bm25_weight: f32,
    ) -> Vec<HybridScore> {
        let vector_hits = self.vector.top_k(query_embedding, limit);
        let ids: Vec<String> = vector_hits.iter().map(|(id, _)| id.clone()).collect();
        let lexical_scores = self.lexical.score(query_text, &ids);

        let max_lexical = lexical_scores
            .values()
            .cloned()
            .fold(0.0_f32, f32::max);

        let mut results: Vec<HybridScore> = vector_hits
            .into_iter()
            .filter_map(|(id, vector_score)| {
                let chunk = self.vector.get(&id)?.clone();
                let raw_lexical = *lexical_scores.get(&id).unwrap_or(&0.0);
                let normalized_lexical = if max_lexical > 0.0 {
                    raw_lexical / max_lexical
                } else {
                    0.0
                };
                let score = vector_weight * vector_score + bm25_weight * normalized_lexical;
                Some(HybridScore {
                    chunk,
                    vector_score,
                    bm25_score: normalized_lexical,
                    score,
                    rerank_score: None,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}
