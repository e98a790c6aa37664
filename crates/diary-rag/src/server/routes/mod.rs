//! API routes for the diary RAG server

pub mod ingest;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Query and ingest, also served at the root
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query_diary))
        .route("/ingest", post(ingest::ingest_text))
}

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    pipeline_routes().route("/info", get(info))
}

/// API info endpoint
async fn info(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    let pipeline = state.pipeline();
    axum::Json(serde_json::json!({
        "name": "diary-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over diary documents",
        "collection": pipeline.collection(),
        "top_k": pipeline.top_k(),
        "providers": {
            "embedding": pipeline.embedder().name(),
            "vector_index": pipeline.index().name(),
            "llm": pipeline.generator().name(),
            "model": pipeline.generator().model(),
        },
        "endpoints": {
            "POST /query": "Answer a question from the indexed diary",
            "POST /ingest": "Chunk, embed and index raw text",
            "GET /api/info": "Service description",
            "GET /health": "Liveness",
            "GET /ready": "Readiness after the embedding self-check"
        }
    }))
}
