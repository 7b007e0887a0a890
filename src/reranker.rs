//! Reranker driver: query-type classification, prompt assembly, tolerant
//! JSON-array parsing, and retry-then-degrade on failure.

use crate::providers::RerankerLlm;
use crate::search::HybridScore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

const CONTENT_TRUNCATE_LEN: usize = 1000;
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Temporal,
    KnowledgeUpdate,
    MultiHop,
    Preference,
    AssistantRecall,
    Factual,
    General,
}

impl QueryType {
    fn instruction(self) -> &'static str {
        match self {
            QueryType::Temporal => {
                "Prioritize candidates with the most specific and relevant dates or timeframes."
            }
            QueryType::KnowledgeUpdate => {
                "Prioritize the most recent information; superseded facts score lower."
            }
            QueryType::MultiHop => {
                "Prioritize candidates that connect multiple entities relevant to the question."
            }
            QueryType::Preference => {
                "Prioritize candidates expressing explicit likes, dislikes, or preferences."
            }
            QueryType::AssistantRecall => {
                "Prioritize candidates describing something the assistant previously said or recommended."
            }
            QueryType::Factual => "Prioritize candidates that directly answer the factual question.",
            QueryType::General => "Prioritize the candidates most relevant to the query overall.",
        }
    }
}

static TEMPORAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(when|what (date|time|day|month|year)|how long ago|how recently|last time|first time|before|after)\b").unwrap()
});
static KNOWLEDGE_UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(change|update|move|switch|new|current|now|still|anymore|used to|latest)\b").unwrap()
});
static MULTI_HOP_RE_A: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwhat .+ (of|for) .+ (the|my|a) .+\b").unwrap());
static MULTI_HOP_RE_B: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b\w+'s \w+'s\b").unwrap());
static PREFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(favorite|prefer|like|enjoy|love|hate|dislike|opinion)\b").unwrap()
});
static ASSISTANT_RECALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(you (said|told|recommended|suggested|mentioned)|did you|your (advice|recommendation|suggestion))\b").unwrap()
});
static FACTUAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(who|what|where|which|name|tell me about)\b").unwrap());

/// Coarse, English-specific, regex-based query classifier. Order matters:
/// the spec fixes this precedence, not just the individual patterns.
#[must_use]
pub fn classify_query(query: &str) -> QueryType {
    if TEMPORAL_RE.is_match(query) {
        QueryType::Temporal
    } else if KNOWLEDGE_UPDATE_RE.is_match(query) {
        QueryType::KnowledgeUpdate
    } else if MULTI_HOP_RE_A.is_match(query) || MULTI_HOP_RE_B.is_match(query) {
        QueryType::MultiHop
    } else if PREFERENCE_RE.is_match(query) {
        QueryType::Preference
    } else if ASSISTANT_RECALL_RE.is_match(query) {
        QueryType::AssistantRecall
    } else if FACTUAL_RE.is_match(query) {
        QueryType::Factual
    } else {
        QueryType::General
    }
}

fn build_prompt(query: &str, results: &[HybridScore], query_type: QueryType) -> String {
    let mut prompt = format!(
        "Query: {query}\nQuery type: {:?}\n{}\n\nCandidates:\n",
        query_type,
        query_type.instruction()
    );
    for (i, r) in results.iter().enumerate() {
        let truncated: String = r.chunk.content.chars().take(CONTENT_TRUNCATE_LEN).collect();
        let date_suffix = r
            .chunk
            .date
            .as_deref()
            .map(|d| format!(" (date: {d})"))
            .unwrap_or_default();
        prompt.push_str(&format!("[{i}] {truncated}{date_suffix}\n"));
    }
    prompt.push_str(
        "\nReturn a JSON array covering every candidate index, like \
         [{\"index\": 0, \"score\": 7}, ...] with scores from 0 to 10.",
    );
    prompt
}

#[derive(Debug, serde::Deserialize)]
struct RawScore {
    index: usize,
    score: f32,
}

/// Extract the first `[...]` block and parse it as `[{index, score}]`.
/// Returns `None` on any parse failure — tolerant, never panics.
fn parse_rerank_response(text: &str) -> Option<Vec<RawScore>> {
    let start = text.find('[')?;
    let end = find_matching_bracket(text, start)?;
    serde_json::from_str(&text[start..=end]).ok()
}

fn find_matching_bracket(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rerank `results` to the top `k`, degrading gracefully to hybrid order on
/// any terminal failure (parse error or transport error after retries).
pub async fn rerank_results(
    llm: &dyn RerankerLlm,
    model: &str,
    query: &str,
    mut results: Vec<HybridScore>,
    k: usize,
) -> Vec<HybridScore> {
    if results.len() <= k {
        return results;
    }

    let query_type = classify_query(query);
    let prompt = build_prompt(query, &results, query_type);

    for attempt in 1..=MAX_ATTEMPTS {
        let response = match llm.generate(model, &prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!("reranker transport error on attempt {attempt}: {err}");
                if attempt < MAX_ATTEMPTS {
                    backoff(attempt).await;
                }
                continue;
            }
        };

        match parse_rerank_response(&response) {
            Some(scores) => {
                debug!("reranker parsed {} scores", scores.len());
                apply_scores(&mut results, &scores);
                results.sort_by(|a, b| {
                    b.chunk_rerank_sort_key()
                        .partial_cmp(&a.chunk_rerank_sort_key())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                results.truncate(k);
                return results;
            }
            None => {
                warn!("reranker returned unparseable output on attempt {attempt}");
                if attempt < MAX_ATTEMPTS {
                    backoff(attempt).await;
                }
            }
        }
    }

    warn!("reranker exhausted {MAX_ATTEMPTS} attempts; falling back to hybrid order");
    results.truncate(k);
    results
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
}

fn apply_scores(results: &mut [HybridScore], scores: &[RawScore]) {
    for raw in scores {
        if let Some(r) = results.get_mut(raw.index) {
            let normalized = raw.score / 10.0;
            r.rerank_score = Some(normalized);
            r.score = normalized;
        }
    }
}

trait RerankSortKey {
    fn chunk_rerank_sort_key(&self) -> f32;
}

impl RerankSortKey for HybridScore {
    fn chunk_rerank_sort_key(&self) -> f32 {
        self.rerank_score.unwrap_or(0.0)
    }
}
