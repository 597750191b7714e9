use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text::normalize;

/// Bot turns without a ticket mention before the prompt asks for one again.
pub const TICKET_REMINDER_INTERVAL: usize = 3;

/// One bubble of the widget conversation, as sent back with each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub text: String,
    #[serde(rename = "isBot", alias = "is_bot", default)]
    pub is_bot: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_bot: false,
            timestamp: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_bot: true,
            timestamp: None,
        }
    }
}

/// Per-conversation facts derived from the history of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub bot_turns: usize,
    /// `None` when no bot turn mentioned tickets yet.
    pub bot_turns_since_ticket_mention: Option<usize>,
}

impl ConversationState {
    pub fn from_history(history: &[ConversationTurn]) -> Self {
        let mut bot_turns = 0;
        let mut since_mention = None;

        for turn in history.iter().filter(|turn| turn.is_bot) {
            bot_turns += 1;
            if mentions_tickets(&turn.text) {
                since_mention = Some(0);
            } else if let Some(count) = since_mention.as_mut() {
                *count += 1;
            }
        }

        Self {
            bot_turns,
            bot_turns_since_ticket_mention: since_mention,
        }
    }

    pub fn should_mention_tickets(&self) -> bool {
        match self.bot_turns_since_ticket_mention {
            Some(count) => count >= TICKET_REMINDER_INTERVAL,
            None => self.bot_turns >= TICKET_REMINDER_INTERVAL,
        }
    }
}

fn mentions_tickets(text: &str) -> bool {
    let normalized = normalize(text);
    normalized.contains("jegy") || normalized.contains("ticket")
}
