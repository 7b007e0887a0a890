//! End-to-end ingest/search scenarios exercised through the public API only.

use async_trait::async_trait;
use memsieve::providers::{Embedder, ExtractionLlm, RerankerLlm};
use memsieve::persistence::FileSnapshotStore;
use memsieve::types::{Message, Session};
use memsieve::{Config, MemsieveEngine, SearchOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _model: &str, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(keyword_vector(text))
    }

    async fn embed_many(&self, _model: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// Toy embedding: one axis per keyword family, so cosine similarity behaves
/// predictably without a real model.
fn keyword_vector(text: &str) -> Vec<f32> {
    let t = text.to_lowercase();
    vec![
        f32::from(u8::from(t.contains("camera") || t.contains("sony"))),
        f32::from(u8::from(t.contains("alice") || t.contains("berlin"))),
        f32::from(u8::from(t.contains("travel"))),
    ]
}

/// Returns a fixed extraction response regardless of input, so tests control
/// exactly what gets ingested.
struct FixedExtractionLlm {
    response: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ExtractionLlm for FixedExtractionLlm {
    async fn generate(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Per-session extraction response keyed by matching a substring of the prompt.
struct RoutingExtractionLlm {
    routes: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl ExtractionLlm for RoutingExtractionLlm {
    async fn generate(&self, _model: &str, prompt: &str) -> anyhow::Result<String> {
        for (needle, response) in &self.routes {
            if prompt.contains(needle) {
                return Ok((*response).to_string());
            }
        }
        Ok("<memories></memories>".to_string())
    }
}

struct EmptyRerankerLlm;

#[async_trait]
impl RerankerLlm for EmptyRerankerLlm {
    async fn generate(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
        Ok("[]".to_string())
    }
}

struct AlwaysMalformedRerankerLlm {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RerankerLlm for AlwaysMalformedRerankerLlm {
    async fn generate(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("the model refused to answer".to_string())
    }
}

fn tmp_store() -> Arc<FileSnapshotStore> {
    let mut p = std::env::temp_dir();
    p.push(format!("memsieve-scenario-{}", uuid::Uuid::new_v4()));
    Arc::new(FileSnapshotStore::new(p))
}

fn session(id: &str, content: &str, date: &str) -> Session {
    Session {
        session_id: id.to_string(),
        date: Some(date.to_string()),
        messages: vec![Message {
            speaker: "user".to_string(),
            timestamp: None,
            content: content.to_string(),
        }],
    }
}

#[tokio::test]
async fn scenario_a_basic_retrieval_resolves_relative_date() {
    let extraction_response =
        "<memories>\n[2024-05-09] User got a Sony A7 camera yesterday.\n</memories>".to_string();
    let engine = MemsieveEngine::new(
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(FixedExtractionLlm {
            response: extraction_response,
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        Arc::new(EmptyRerankerLlm),
        tmp_store(),
    );

    engine
        .ingest(
            "t",
            vec![session(
                "s1",
                "I got a Sony A7 camera yesterday. / Nice, what lens?",
                "2024-05-10",
            )],
        )
        .await
        .unwrap();

    let opts = SearchOptions {
        container_tag: "t".to_string(),
        limit: 3,
    };
    let results = engine
        .search("what camera does the user own", &opts)
        .await
        .unwrap();

    assert!(results[0].content.contains("Sony A7"));
    assert_eq!(results[0].event_date.as_deref(), Some("2024-05-09"));
}

#[tokio::test]
async fn scenario_b_hybrid_beats_vector_only() {
    let engine = MemsieveEngine::new(
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(RoutingExtractionLlm {
            routes: vec![
                ("alice-session", "<memories>\nuser met Alice in Berlin\n</memories>"),
                ("travel-session", "<memories>\nuser talked about travel\n</memories>"),
            ],
        }),
        Arc::new(EmptyRerankerLlm),
        tmp_store(),
    );

    engine
        .ingest(
            "t",
            vec![
                session("s1", "alice-session", "2024-01-01"),
                session("s2", "travel-session", "2024-01-02"),
            ],
        )
        .await
        .unwrap();

    let opts = SearchOptions {
        container_tag: "t".to_string(),
        limit: 5,
    };
    let results = engine.search("Alice Berlin", &opts).await.unwrap();

    let alice_idx = results.iter().position(|r| r.content.contains("Alice")).unwrap();
    let travel_idx = results.iter().position(|r| r.content.contains("travel")).unwrap();
    assert!(alice_idx < travel_idx);
    assert!(results[alice_idx].bm25_score > 0.0);
    assert_eq!(results[travel_idx].bm25_score, 0.0);
}

#[tokio::test]
async fn scenario_c_graph_expansion_includes_entities_and_relationships() {
    let extraction_response = "\
<memories>
user talked about Alice
</memories>
<entities>
Alice|person|close friend
Bob|person|alice's spouse
Acme|organization|alice's employer
</entities>
<relationships>
Alice|married_to|Bob
Alice|works_at|Acme
</relationships>"
        .to_string();

    let engine = MemsieveEngine::new(
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(FixedExtractionLlm {
            response: extraction_response,
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        Arc::new(EmptyRerankerLlm),
        tmp_store(),
    );

    engine
        .ingest("t", vec![session("s1", "alice", "2024-01-01")])
        .await
        .unwrap();

    let opts = SearchOptions {
        container_tag: "t".to_string(),
        limit: 1,
    };
    let results = engine.search("tell me about Alice", &opts).await.unwrap();

    let entity_names: Vec<&str> = results
        .iter()
        .filter(|r| r.result_type.as_deref() == Some("entity"))
        .filter_map(|r| r.name.as_deref())
        .collect();
    assert!(entity_names.contains(&"Alice"));
    assert!(entity_names.contains(&"Bob"));
    assert!(entity_names.contains(&"Acme"));

    let relationship_count = results
        .iter()
        .filter(|r| r.result_type.as_deref() == Some("relationship"))
        .count();
    assert_eq!(relationship_count, 2);
}

#[tokio::test]
async fn scenario_d_clear_is_destructive() {
    let extraction_response = "\
<memories>
user talked about Alice
</memories>
<entities>
Alice|person|close friend
</entities>
<relationships>
Alice|married_to|Bob
</relationships>"
        .to_string();

    let engine = MemsieveEngine::new(
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(FixedExtractionLlm {
            response: extraction_response,
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        Arc::new(EmptyRerankerLlm),
        tmp_store(),
    );

    engine
        .ingest("t", vec![session("s1", "alice", "2024-01-01")])
        .await
        .unwrap();
    engine.clear("t").await.unwrap();

    let opts = SearchOptions {
        container_tag: "t".to_string(),
        limit: 5,
    };
    let results = engine.search("tell me about Alice", &opts).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn scenario_e_concurrent_ingest_dedups_extraction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = MemsieveEngine::new(
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(FixedExtractionLlm {
            response: "<memories>\nuser got a camera\n</memories>".to_string(),
            calls: calls.clone(),
        }),
        Arc::new(EmptyRerankerLlm),
        tmp_store(),
    );

    let s = session("shared", "camera", "2024-01-01");
    let (r1, r2) = tokio::join!(
        engine.ingest("t", vec![s.clone()]),
        engine.ingest("t", vec![s.clone()])
    );
    let r1 = r1.unwrap();
    let r2 = r2.unwrap();

    assert_eq!(r1.document_ids, r2.document_ids);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_f_reranker_failure_falls_back_to_hybrid_order() {
    let reranker_calls = Arc::new(AtomicUsize::new(0));
    let engine = MemsieveEngine::new(
        // Default overfetch (40) comfortably covers the 2-chunk corpus below,
        // so the hybrid result count (2) exceeds the search limit (1) and a
        // rerank attempt actually fires.
        Config::default(),
        Arc::new(StubEmbedder),
        Arc::new(RoutingExtractionLlm {
            routes: vec![
                ("s1-marker", "<memories>\nuser got a camera\n</memories>"),
                ("s2-marker", "<memories>\nuser got a second camera\n</memories>"),
            ],
        }),
        Arc::new(AlwaysMalformedRerankerLlm {
            calls: reranker_calls.clone(),
        }),
        tmp_store(),
    );

    engine
        .ingest(
            "t",
            vec![
                session("s1", "s1-marker", "2024-01-01"),
                session("s2", "s2-marker", "2024-01-02"),
            ],
        )
        .await
        .unwrap();

    let opts = SearchOptions {
        container_tag: "t".to_string(),
        limit: 1,
    };
    let results = engine.search("camera", &opts).await.unwrap();

    assert_eq!(results.len(), 1);
    // Retries 3 times per the spec's backoff contract before giving up.
    assert_eq!(reranker_calls.load(Ordering::SeqCst), 3);
}
