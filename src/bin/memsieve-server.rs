//! memsieve HTTP server binary

use memsieve::providers_http::{HttpClient, HttpEmbedder, HttpExtractionLlm, HttpRerankerLlm};
use memsieve::{Config, MemsieveEngine};
use std::sync::Arc;

mod server {
    pub use memsieve::server::*;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::from_env();
    config.validate()?;

    println!("memsieve retrieval engine");
    println!("  version: {}", env!("CARGO_PKG_VERSION"));
    println!("  snapshot root: {}", config.snapshot_root);
    println!();

    let api_key = config.require_api_key()?.to_string();
    let llm_base_url =
        std::env::var("MEMSIEVE_LLM_URL").unwrap_or_else(|_| "http://127.0.0.1:8090/v1".to_string());

    let embedder = Arc::new(HttpEmbedder::new(HttpClient::new(&llm_base_url, &api_key)));
    let extraction_llm = Arc::new(HttpExtractionLlm::new(HttpClient::new(&llm_base_url, &api_key)));
    let reranker_llm = Arc::new(HttpRerankerLlm::new(HttpClient::new(&llm_base_url, &api_key)));
    let store = Arc::new(memsieve::persistence::FileSnapshotStore::new(
        config.snapshot_root.clone(),
    ));

    let engine = MemsieveEngine::new(config, embedder, extraction_llm, reranker_llm, store);

    let port: u16 = std::env::var("MEMSIEVE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8085);

    println!("starting HTTP server on port {port}...");
    server::run_server(engine, port).await?;

    Ok(())
}
