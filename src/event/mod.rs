//! Event profile: the single source of business facts.
//!
//! Pricing phases, schedule, speaker directory, workshops and the canned
//! fallback table live in one YAML resource. The prompt assembler, the
//! entity detector and the fallback responder all read from it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const EMBEDDED_PROFILE: &str = include_str!("../../assets/event_profile.yml");

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read event profile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse event profile: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid event profile: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProfile {
    pub version: String,
    pub name: String,
    pub date: NaiveDate,
    pub city: String,
    pub venue: String,
    pub site_url: String,
    #[serde(default)]
    pub organizers: Vec<String>,
    #[serde(default)]
    pub ticket_sales_open: Option<NaiveDate>,
    #[serde(default)]
    pub pricing: Vec<PricingPhase>,
    #[serde(default)]
    pub ticket_notes: Vec<String>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub speakers: Vec<Speaker>,
    #[serde(default)]
    pub workshops: Vec<Workshop>,
    #[serde(default)]
    pub logistics: Vec<String>,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub generic_fallback: String,
    /// Topic key to pre-written answer variants.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPhase {
    pub label: String,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub tiers: Vec<TicketTier>,
}

impl PricingPhase {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_until
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTier {
    pub name: String,
    pub price_huf: u32,
    #[serde(default)]
    pub perks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub slot: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    /// Canonical display form, e.g. "Szauder Dávid".
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub talk: Option<String>,
    /// Lowercase, accent-free spellings matched against user text.
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workshop {
    pub title: String,
    #[serde(default)]
    pub host: Option<String>,
}

impl EventProfile {
    /// The profile compiled into the binary.
    pub fn embedded() -> Result<Self, ProfileError> {
        Self::from_yaml(EMBEDDED_PROFILE)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ProfileError> {
        let profile: EventProfile = serde_yaml::from_str(raw)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let raw = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Loads the override file when given, the embedded profile otherwise.
    pub fn load(override_path: Option<&Path>) -> Result<Self, ProfileError> {
        match override_path {
            Some(path) => {
                tracing::info!("Loading event profile from {}", path.display());
                Self::from_file(path)
            }
            None => Self::embedded(),
        }
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::Invalid("name is empty".to_string()));
        }
        for phase in &self.pricing {
            if phase.valid_from > phase.valid_until {
                return Err(ProfileError::Invalid(format!(
                    "pricing phase '{}' ends before it starts",
                    phase.label
                )));
            }
        }
        for speaker in &self.speakers {
            if speaker.name.trim().is_empty() {
                return Err(ProfileError::Invalid("speaker without a name".to_string()));
            }
        }
        Ok(())
    }

    /// Pricing phase in effect on `today`.
    ///
    /// Falls back to the latest phase that already started, then to the
    /// earliest phase when sales have not opened yet.
    pub fn pricing_for(&self, today: NaiveDate) -> Option<&PricingPhase> {
        if let Some(active) = self.pricing.iter().find(|phase| phase.contains(today)) {
            return Some(active);
        }

        let started = self
            .pricing
            .iter()
            .filter(|phase| phase.valid_from <= today)
            .max_by_key(|phase| phase.valid_from);
        if started.is_some() {
            return started;
        }

        self.pricing.iter().min_by_key(|phase| phase.valid_from)
    }

    pub fn fallback_variants(&self, topic_key: &str) -> &[String] {
        self.fallbacks
            .get(topic_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Host part of the public site, used to spot explicit site mentions.
    pub fn site_host(&self) -> Option<&str> {
        let without_scheme = self
            .site_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.site_url);
        without_scheme
            .split('/')
            .next()
            .map(|host| host.trim_start_matches("www."))
            .filter(|host| !host.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn embedded_profile_parses() {
        let profile = EventProfile::embedded().unwrap();

        assert_eq!(profile.name, "AI Talks");
        assert_eq!(profile.date, date(2025, 11, 20));
        assert!(profile
            .speakers
            .iter()
            .any(|speaker| speaker.name == "Szauder Dávid"));
        assert!(!profile.generic_fallback.is_empty());
        assert!(profile.fallback_variants("ticket").len() >= 2);
        assert_eq!(profile.site_host(), Some("aitalks.hu"));
    }

    #[test]
    fn pricing_follows_date_ranges() {
        let profile = EventProfile::embedded().unwrap();

        let early = profile.pricing_for(date(2025, 9, 15)).unwrap();
        assert!(early.tiers.iter().any(|tier| tier.name == "Early Bird"));

        let standard = profile.pricing_for(date(2025, 10, 19)).unwrap();
        assert!(standard.tiers.iter().any(|tier| tier.name == "Standard"));

        let after = profile.pricing_for(date(2026, 1, 1)).unwrap();
        assert_eq!(after.label, "Standard időszak");

        let before = profile.pricing_for(date(2025, 1, 1)).unwrap();
        assert_eq!(before.label, "Early Bird időszak");
    }

    #[test]
    fn rejects_inverted_pricing_phase() {
        let raw = r#"
version: "x"
name: "AI Talks"
date: "2025-11-20"
city: "Budapest"
venue: "Bálna"
site_url: "https://aitalks.hu"
pricing:
  - label: "broken"
    valid_from: "2025-10-01"
    valid_until: "2025-09-01"
    tiers: []
"#;
        assert!(matches!(
            EventProfile::from_yaml(raw),
            Err(ProfileError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_topic_has_no_variants() {
        let profile = EventProfile::embedded().unwrap();
        assert!(profile.fallback_variants("weather").is_empty());
    }
}
