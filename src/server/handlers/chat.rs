use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chat::{ChatInput, ChatOutcome, ContextSource, ConversationTurn, Topic};
use crate::core::errors::ApiError;
use crate::interactions::InteractionRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub topic_hint: Option<String>,
    #[serde(default)]
    pub last_followups: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatMetadata {
    pub used_context_count: usize,
    pub context_ids: Vec<String>,
    pub filter_tags: Vec<String>,
    pub speaker_detected: Option<String>,
    pub topic: Topic,
    pub context_source: ContextSource,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub metadata: ChatMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ChatResponseBody {
    fn from_outcome(outcome: ChatOutcome, session_id: String) -> Self {
        Self {
            error: outcome.error.map(|kind| kind.as_str()),
            status: outcome.error.map(|kind| kind.status_code()),
            response: outcome.response,
            metadata: ChatMetadata {
                used_context_count: outcome.used_context_count,
                context_ids: outcome.context_ids,
                filter_tags: outcome.filter_tags,
                speaker_detected: outcome.speaker,
                topic: outcome.topic,
                context_source: outcome.source,
                session_id,
            },
        }
    }
}

/// Answers one widget message. Always 200 once a message is present;
/// upstream rate-limit and payment failures are reported in the body.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload.map_err(|err| {
        tracing::debug!("Rejected chat body: {}", err);
        match err {
            // Well-formed JSON of the wrong shape, e.g. a history turn without text.
            JsonRejection::JsonDataError(data_err) => ApiError::BadRequest(data_err.body_text()),
            _ => ApiError::BadRequest("Message is required".to_string()),
        }
    })?;

    let message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?
        .to_string();

    let session_id = body
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let input = ChatInput {
        message: message.clone(),
        history: body.history,
        topic_hint: body.topic_hint,
        last_followups: body.last_followups,
    };

    let outcome = state.pipeline.respond(&input, Utc::now().date_naive()).await;

    state.interactions.dispatch(InteractionRecord {
        session_id: session_id.clone(),
        question: message,
        answer: outcome.response.clone(),
        page_url: body.page_url,
        user_agent: header_string(&headers, header::USER_AGENT),
        referrer: header_string(&headers, header::REFERER),
        metadata: json!({
            "topic": outcome.topic,
            "speaker_detected": outcome.speaker,
            "context_source": outcome.source,
            "used_context_count": outcome.used_context_count,
            "origin": outcome.origin,
            "error": outcome.error,
        }),
    });

    Ok(Json(ChatResponseBody::from_outcome(outcome, session_id)))
}

pub async fn greeting(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "response": state.pipeline.greeting() }))
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
