use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One completion call: system prompt, prior turns, then the user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub user_message: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            user_message: user_message.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.user_message.clone()));
        messages
    }
}

/// Outcome of a single completion attempt with one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    RateLimited,
    PaymentRequired,
}

/// Classified upstream failure reported back to the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    RateLimited,
    PaymentRequired,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::RateLimited => "rate_limited",
            UpstreamErrorKind::PaymentRequired => "payment_required",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamErrorKind::RateLimited => 429,
            UpstreamErrorKind::PaymentRequired => 402,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_ordered_system_history_user() {
        let request = CompletionRequest::new("rules", "Mikor kezdődik?").with_history(vec![
            ChatMessage::user("Szia"),
            ChatMessage::assistant("Szia! Miben segíthetek?"),
        ]);

        let roles: Vec<String> = request.messages().into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn error_kinds_map_to_status_codes() {
        assert_eq!(UpstreamErrorKind::RateLimited.status_code(), 429);
        assert_eq!(UpstreamErrorKind::PaymentRequired.as_str(), "payment_required");
    }
}
