//! HTTP surface for the retrieval engine: ingest, search, clear, health.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::orchestrator::{MemsieveEngine, SearchOptions};
use crate::types::{Session, SearchResult};

#[derive(Debug, Deserialize)]
pub struct IngestRequestHttp {
    pub container_tag: String,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponseHttp {
    pub document_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequestHttp {
    pub container_tag: String,
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct SearchResponseHttp {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct ClearRequestHttp {
    pub container_tag: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

async fn ingest_handler(
    State(engine): State<Arc<MemsieveEngine>>,
    Json(req): Json<IngestRequestHttp>,
) -> Result<Json<IngestResponseHttp>, (StatusCode, Json<ErrorResponse>)> {
    info!(container = %req.container_tag, sessions = req.sessions.len(), "ingest request");

    match engine.ingest(&req.container_tag, req.sessions).await {
        Ok(result) => Ok(Json(IngestResponseHttp {
            document_ids: result.document_ids,
        })),
        Err(e) => {
            error!("ingest failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "ingest failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn search_handler(
    State(engine): State<Arc<MemsieveEngine>>,
    Json(req): Json<SearchRequestHttp>,
) -> Result<Json<SearchResponseHttp>, (StatusCode, Json<ErrorResponse>)> {
    let opts = SearchOptions {
        container_tag: req.container_tag.clone(),
        limit: req.limit,
    };

    match engine.search(&req.query, &opts).await {
        Ok(results) => Ok(Json(SearchResponseHttp { results })),
        Err(e) => {
            error!("search failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "search failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn clear_handler(
    State(engine): State<Arc<MemsieveEngine>>,
    Json(req): Json<ClearRequestHttp>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match engine.clear(&req.container_tag).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("clear failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "clear failed".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "memsieve".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create and configure the HTTP server.
pub fn create_router(engine: Arc<MemsieveEngine>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_handler))
        .route("/ingest", post(ingest_handler))
        .route("/search", post(search_handler))
        .route("/clear", post(clear_handler))
        .with_state(engine)
}

/// Run the HTTP server.
pub async fn run_server(engine: Arc<MemsieveEngine>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    info!("starting memsieve server on {addr}");

    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
