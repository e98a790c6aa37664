//! Raw text ingestion endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{IngestRequest, IngestResponse};

/// POST /ingest - Chunk, embed and index a document
pub async fn ingest_text(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();

    let entries_written = state.pipeline().ingest(&request.text).await?;

    tracing::info!(
        entries_written,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Ingested text"
    );

    Ok(Json(IngestResponse { entries_written }))
}
