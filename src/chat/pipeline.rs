//! Per-request chat pipeline.
//!
//! Each request walks the same one-shot stages:
//! detect -> retrieve -> assemble prompt -> generate, and drops to the
//! canned fallback whenever generation does not produce text. Retrieval
//! failures never abort the request; they only shrink the context.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::time::timeout;

use super::conversation::{ConversationState, ConversationTurn};
use super::detector::{Detection, EntityDetector, Topic};
use super::fallback::FallbackResponder;
use super::prompt::PromptAssembler;
use super::retrieval::{ContextSource, RetrievalOrchestrator, RetrievalOutcome};
use crate::llm::{ChatMessage, Completion, CompletionRequest, LlmService, UpstreamErrorKind};

/// Headroom on top of the LLM service's own worst case.
const GENERATION_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub message: String,
    pub history: Vec<ConversationTurn>,
    pub topic_hint: Option<String>,
    pub last_followups: Vec<String>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub origin: ResponseOrigin,
    pub topic: Topic,
    pub speaker: Option<String>,
    pub source: ContextSource,
    /// Chunks that actually reached the prompt.
    pub used_context_count: usize,
    pub context_ids: Vec<String>,
    pub filter_tags: Vec<String>,
    pub error: Option<UpstreamErrorKind>,
}

enum Generation {
    Text(String),
    Upstream(UpstreamErrorKind),
    Failed,
}

pub struct ChatPipeline {
    detector: EntityDetector,
    retrieval: RetrievalOrchestrator,
    prompt: PromptAssembler,
    llm: LlmService,
    fallback: FallbackResponder,
    context_limit: usize,
    history_turns: usize,
    llm_timeout: Duration,
}

impl ChatPipeline {
    /// The generation deadline follows the service: every attempt it may
    /// make, plus [`GENERATION_SLACK`].
    pub fn new(
        detector: EntityDetector,
        retrieval: RetrievalOrchestrator,
        prompt: PromptAssembler,
        llm: LlmService,
        fallback: FallbackResponder,
        context_limit: usize,
        history_turns: usize,
    ) -> Self {
        let llm_timeout = llm.max_duration() + GENERATION_SLACK;
        Self {
            detector,
            retrieval,
            prompt,
            llm,
            fallback,
            context_limit,
            history_turns,
            llm_timeout,
        }
    }

    pub fn greeting(&self) -> String {
        self.fallback.greeting()
    }

    pub async fn respond(&self, input: &ChatInput, today: NaiveDate) -> ChatOutcome {
        let detection = self.detect(input);
        tracing::info!(
            "Chat request: topic={}, speaker={:?}, inherited={}",
            detection.topic,
            detection.speaker,
            detection.inherited
        );

        let retrieved = self.retrieval.retrieve(&detection).await;
        let used: Vec<_> = retrieved
            .chunks
            .iter()
            .take(self.context_limit)
            .cloned()
            .collect();
        tracing::info!(
            "Context: source={:?}, retrieved={}, used={}",
            retrieved.source,
            retrieved.chunks.len(),
            used.len()
        );

        let state = ConversationState::from_history(&input.history);
        let system_prompt =
            self.prompt
                .assemble_with_followups(&used, &state, today, &input.last_followups);
        let request = CompletionRequest::new(system_prompt, input.message.trim())
            .with_history(self.history_messages(&input.history));

        let (response, origin, error) = match self.generate(&request).await {
            Generation::Text(text) => (text, ResponseOrigin::Llm, None),
            Generation::Upstream(kind) => {
                tracing::warn!("LLM unavailable ({}), using fallback", kind.as_str());
                (
                    self.fallback.respond(&input.message, Some(detection.topic)),
                    ResponseOrigin::Fallback,
                    Some(kind),
                )
            }
            Generation::Failed => (
                self.fallback.respond(&input.message, Some(detection.topic)),
                ResponseOrigin::Fallback,
                None,
            ),
        };

        let RetrievalOutcome {
            source,
            filter_tags,
            ..
        } = retrieved;

        ChatOutcome {
            response,
            origin,
            topic: detection.topic,
            speaker: detection.speaker,
            source,
            used_context_count: used.len(),
            context_ids: used.into_iter().map(|chunk| chunk.id).collect(),
            filter_tags,
            error,
        }
    }

    /// Detection with the widget's topic hint applied when the message
    /// itself carries no topic.
    fn detect(&self, input: &ChatInput) -> Detection {
        let mut detection = self.detector.detect(&input.message, &input.history);
        if detection.topic.is_general() {
            if let Some(hint) = input.topic_hint.as_deref().and_then(Topic::parse) {
                tracing::debug!("Using topic hint {}", hint);
                detection.topic = hint;
            }
        }
        detection
    }

    fn history_messages(&self, history: &[ConversationTurn]) -> Vec<ChatMessage> {
        let skip = history.len().saturating_sub(self.history_turns);
        history
            .iter()
            .skip(skip)
            .filter(|turn| !turn.text.trim().is_empty())
            .map(|turn| {
                if turn.is_bot {
                    ChatMessage::assistant(turn.text.clone())
                } else {
                    ChatMessage::user(turn.text.clone())
                }
            })
            .collect()
    }

    async fn generate(&self, request: &CompletionRequest) -> Generation {
        match timeout(self.llm_timeout, self.llm.complete(request)).await {
            Ok(Ok(Completion::Text(text))) => Generation::Text(text),
            Ok(Ok(Completion::RateLimited)) => Generation::Upstream(UpstreamErrorKind::RateLimited),
            Ok(Ok(Completion::PaymentRequired)) => {
                Generation::Upstream(UpstreamErrorKind::PaymentRequired)
            }
            Ok(Err(err)) => {
                tracing::warn!("LLM call failed: {}", err);
                Generation::Failed
            }
            Err(_) => {
                tracing::warn!("LLM call timed out after {:?}", self.llm_timeout);
                Generation::Failed
            }
        }
    }
}
