use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::core::security::require_admin_token;
use crate::knowledge::{IngestError, IngestRequest};
use crate::state::AppState;

/// Admin-only document ingestion. The token is checked before the body
/// is even parsed.
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin_token(&headers, &state.admin_token)?;

    let Json(request) = payload.map_err(|_| ApiError::BadRequest(IngestError::MissingFields.to_string()))?;

    let report = state.ingest.ingest(request).await.map_err(|err| match err {
        IngestError::MissingFields => ApiError::BadRequest(err.to_string()),
        IngestError::Store(inner) => ApiError::internal(inner),
    })?;

    Ok(Json(report))
}
