use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let knowledge_chunks = match state.knowledge.chunk_count().await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!("Health check could not count chunks: {}", err);
            None
        }
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "knowledge_chunks": knowledge_chunks,
    }))
}
