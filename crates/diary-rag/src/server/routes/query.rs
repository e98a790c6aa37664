//! Query endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question from the indexed diary
///
/// Unsuccessful outcomes, whether empty or failed, answer 404 with the
/// outcome message as `detail`.
pub async fn query_diary(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let outcome = state.pipeline().query(&request.question).await;

    if !outcome.succeeded {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": outcome.answer })),
        )
            .into_response();
    }

    Json(QueryResponse::from(outcome)).into_response()
}
