//! Canned Hungarian answers used when the LLM cannot respond.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use sha2::{Digest, Sha256};

use super::detector::Topic;
use super::text::normalize;
use crate::event::EventProfile;

/// Used only if the profile itself carries no generic answer.
const LAST_RESORT: &str =
    "Köszi a kérdést! Most nem érem el az adatbázist, de a weboldalon minden részletet megtalálsz. 🙂";

pub struct FallbackResponder {
    profile: EventProfile,
}

impl FallbackResponder {
    pub fn new(profile: EventProfile) -> Self {
        Self { profile }
    }

    /// Always returns a non-empty answer. The variant for a known topic is
    /// picked by a generator seeded from the message, so the same message
    /// gets the same answer.
    pub fn respond(&self, message: &str, topic: Option<Topic>) -> String {
        let variants: Vec<&String> = match topic {
            Some(topic) if !topic.is_general() => self
                .profile
                .fallback_variants(topic.as_str())
                .iter()
                .filter(|variant| !variant.trim().is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let mut rng = StdRng::seed_from_u64(message_seed(message));
        if let Some(choice) = variants.choose(&mut rng) {
            return (*choice).clone();
        }

        self.generic()
    }

    pub fn generic(&self) -> String {
        if self.profile.generic_fallback.trim().is_empty() {
            LAST_RESORT.to_string()
        } else {
            self.profile.generic_fallback.clone()
        }
    }

    pub fn greeting(&self) -> String {
        if self.profile.greeting.trim().is_empty() {
            self.generic()
        } else {
            self.profile.greeting.clone()
        }
    }
}

fn message_seed(message: &str) -> u64 {
    let digest = Sha256::digest(normalize(message).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
