//! Topic and speaker detection with history-aware query expansion.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::conversation::ConversationTurn;
use super::text::normalize;
use crate::event::EventProfile;

/// Messages shorter than this (in chars) are treated as follow-ups.
pub const MIN_STANDALONE_LEN: usize = 15;
/// How many recent turns are searched for an entity to carry over.
pub const HISTORY_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Workshop,
    Parking,
    Allergen,
    Restaurant,
    DressCode,
    Ticket,
    Speaker,
    Program,
    Location,
    Networking,
    Value,
    Organizer,
    General,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Workshop => "workshop",
            Topic::Parking => "parking",
            Topic::Allergen => "allergen",
            Topic::Restaurant => "restaurant",
            Topic::DressCode => "dress_code",
            Topic::Ticket => "ticket",
            Topic::Speaker => "speaker",
            Topic::Program => "program",
            Topic::Location => "location",
            Topic::Networking => "networking",
            Topic::Value => "value",
            Topic::Organizer => "organizer",
            Topic::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Option<Topic> {
        let topic = match normalize(raw).replace('-', "_").as_str() {
            "workshop" => Topic::Workshop,
            "parking" => Topic::Parking,
            "allergen" => Topic::Allergen,
            "restaurant" => Topic::Restaurant,
            "dress_code" | "dresscode" => Topic::DressCode,
            "ticket" => Topic::Ticket,
            "speaker" => Topic::Speaker,
            "program" => Topic::Program,
            "location" => Topic::Location,
            "networking" => Topic::Networking,
            "value" => Topic::Value,
            "organizer" => Topic::Organizer,
            "general" => Topic::General,
            _ => return None,
        };
        Some(topic)
    }

    pub fn is_general(&self) -> bool {
        matches!(self, Topic::General)
    }

    /// Knowledge tags that restrict vector search for this topic.
    pub fn filter_tags(&self) -> &'static [&'static str] {
        match self {
            Topic::Workshop => &["workshop", "program"],
            Topic::Parking => &["parkolas", "logisztika"],
            Topic::Allergen => &["vendeglatas", "bufe"],
            Topic::Restaurant => &["vendeglatas", "bufe", "etterem"],
            Topic::DressCode => &["logisztika", "dress-code"],
            Topic::Ticket => &["jegyek", "kedvezmenyek", "early-bird"],
            Topic::Speaker => &["eloadok", "speaker"],
            Topic::Program => &["program", "menetrend"],
            Topic::Location => &["logisztika", "helyszin", "balna"],
            Topic::Networking => &["networking", "vip"],
            Topic::Value => &[],
            Topic::Organizer => &["szervezok"],
            Topic::General => &[],
        }
    }

    /// Words appended to a follow-up query that inherited this topic.
    pub fn search_hint(&self) -> &'static str {
        match self {
            Topic::Workshop => "workshop",
            Topic::Parking => "parkolás",
            Topic::Allergen => "allergén",
            Topic::Restaurant => "étterem",
            Topic::DressCode => "öltözet",
            Topic::Ticket => "jegy ár",
            Topic::Speaker => "előadó",
            Topic::Program => "program",
            Topic::Location => "helyszín",
            Topic::Networking => "networking",
            Topic::Value => "előnyök",
            Topic::Organizer => "szervezők",
            Topic::General => "",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct TopicRule {
    topic: Topic,
    pattern: Regex,
}

/// Ordered rule table; the first matching rule wins.
pub struct TopicClassifier {
    rules: Vec<TopicRule>,
}

impl TopicClassifier {
    pub fn new() -> Self {
        // Patterns run against normalized (lowercase, accent-free) text.
        let table: &[(Topic, &str)] = &[
            (
                Topic::Program,
                r"\b(program\w*|menetrend\w*|idopont\w*|mikor\b|napirend\w*|agenda\b|kezdes\w*|hanykor)",
            ),
            (Topic::Workshop, r"\b(workshop\w*|muhely\w*)"),
            (Topic::Parking, r"\b(parkol\w*|melygarazs\w*|garazs\w*)"),
            (
                Topic::Restaurant,
                r"\b(etterem\w*|ettermek\w*|ebed\w*|vacsor\w*|enni\b|bufe\w*|kave\w*)",
            ),
            (
                Topic::Ticket,
                r"\b(jegy\w*|belepo\w*|ar|ara|arak\w*|arat|koltseg\w*|mennyibe|kedvezmeny\w*|early\s*bird|ticket\w*)\b",
            ),
            (
                Topic::Speaker,
                r"\b(eloado\w*|speaker\w*|kik? beszel\w*|ki lep fel)",
            ),
            (
                Topic::Location,
                r"\b(helyszin\w*|hol lesz|hol van|cim(e|et|re)?\b|balna\w*|megkozelit\w*)",
            ),
            (
                Topic::DressCode,
                r"\b(dress\s*code|oltozet\w*|oltozk\w*|ruha\w*|viselet\w*)",
            ),
            (
                Topic::Networking,
                r"\b(networking\w*|kapcsolat\w*|ismerkedes\w*)",
            ),
            // Narrower topics the widget also answers; checked after the core set.
            (
                Topic::Allergen,
                r"\b(allergen\w*|gluten\w*|laktoz\w*|vegan\w*|vegetarian\w*)",
            ),
            (
                Topic::Value,
                r"\b(miert\b|erdemes|elony\w*|haszon\w*|megeri)",
            ),
            (Topic::Organizer, r"\b(hvg|amazing|szervezo\w*)"),
        ];

        let rules = table
            .iter()
            .map(|(topic, pattern)| TopicRule {
                topic: *topic,
                pattern: Regex::new(pattern).expect("topic patterns are valid"),
            })
            .collect();

        Self { rules }
    }

    pub fn classify(&self, message: &str) -> Topic {
        let normalized = normalize(message);
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&normalized))
            .map(|rule| rule.topic)
            .unwrap_or(Topic::General)
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical speaker names with their accent-free spellings.
#[derive(Debug, Clone)]
pub struct SpeakerDirectory {
    entries: Vec<(String, Vec<String>)>,
}

impl SpeakerDirectory {
    pub fn from_profile(profile: &EventProfile) -> Self {
        let entries = profile
            .speakers
            .iter()
            .map(|speaker| {
                let mut variants: Vec<String> = speaker
                    .variants
                    .iter()
                    .map(|variant| normalize(variant))
                    .filter(|variant| !variant.is_empty())
                    .collect();
                let canonical = normalize(&speaker.name);
                if !variants.contains(&canonical) {
                    variants.push(canonical);
                }
                (speaker.name.clone(), variants)
            })
            .collect();
        Self { entries }
    }

    /// Canonical name of the speaker mentioned earliest in `text`.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let normalized = normalize(text);
        self.entries
            .iter()
            .filter_map(|(name, variants)| {
                variants
                    .iter()
                    .filter_map(|variant| normalized.find(variant.as_str()))
                    .min()
                    .map(|position| (position, name.as_str()))
            })
            .min_by_key(|(position, _)| *position)
            .map(|(_, name)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub topic: Topic,
    pub speaker: Option<String>,
    pub expanded_query: String,
    /// True when the speaker or topic was carried over from history.
    pub inherited: bool,
}

pub struct EntityDetector {
    classifier: TopicClassifier,
    speakers: SpeakerDirectory,
    pronouns: Regex,
    references: Regex,
}

impl EntityDetector {
    pub fn new(profile: &EventProfile) -> Self {
        Self {
            classifier: TopicClassifier::new(),
            speakers: SpeakerDirectory::from_profile(profile),
            // Run against lowercase text with accents intact.
            pronouns: Regex::new(
                r"\b(ő|ők|őt|őket|neki|nekik|róla|róluk|tőle|tőlük|vele|velük|övé|ezt|azt|erről|arról|ennek|annak)\b",
            )
            .expect("pronoun pattern is valid"),
            references: Regex::new(r"\b(az előadás\w*|előadása\w*|a workshop\w*|workshopja\w*)")
                .expect("reference pattern is valid"),
        }
    }

    pub fn classify(&self, message: &str) -> Topic {
        self.classifier.classify(message)
    }

    pub fn detect_speaker(&self, message: &str) -> Option<String> {
        self.speakers.detect(message).map(str::to_string)
    }

    pub fn detect(&self, message: &str, history: &[ConversationTurn]) -> Detection {
        let topic = self.classify(message);
        let speaker = self.detect_speaker(message);
        let unchanged = Detection {
            topic,
            speaker: speaker.clone(),
            expanded_query: message.trim().to_string(),
            inherited: false,
        };

        if speaker.is_some() || !self.is_follow_up(message) {
            return unchanged;
        }

        let recent_user_turns: Vec<&ConversationTurn> = history
            .iter()
            .rev()
            .filter(|turn| !turn.is_bot)
            .take(HISTORY_WINDOW)
            .collect();

        if let Some(previous) = recent_user_turns
            .iter()
            .find_map(|turn| self.speakers.detect(&turn.text))
        {
            tracing::debug!("Expanding follow-up with speaker {}", previous);
            return Detection {
                topic,
                speaker: Some(previous.to_string()),
                expanded_query: format!("{} {}", message.trim(), previous),
                inherited: true,
            };
        }

        if topic.is_general() {
            if let Some(previous) = recent_user_turns
                .iter()
                .map(|turn| self.classify(&turn.text))
                .find(|topic| !topic.is_general())
            {
                tracing::debug!("Expanding follow-up with topic {}", previous);
                return Detection {
                    topic: previous,
                    speaker: None,
                    expanded_query: format!("{} {}", message.trim(), previous.search_hint()),
                    inherited: true,
                };
            }
        }

        unchanged
    }

    fn is_follow_up(&self, message: &str) -> bool {
        let trimmed = message.trim();
        if trimmed.chars().count() < MIN_STANDALONE_LEN {
            return true;
        }
        let lowered = trimmed.to_lowercase();
        self.pronouns.is_match(&lowered) || self.references.is_match(&lowered)
    }
}
