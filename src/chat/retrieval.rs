//! Retrieval orchestration: vector, keyword, then scrape, first hit wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::time::timeout;

use super::detector::{Detection, Topic};
use super::scraper::PageScraper;
use super::text::{extract_keywords, normalize};
use crate::core::config::RetrievalConfig;
use crate::knowledge::{best_similarity, KnowledgeStore, RetrievedChunk};
use crate::llm::Embedder;

pub const WEB_SCRAPING_TAG: &str = "web_scraping";
const SITE_MENTIONS: &[&str] = &["weboldal", "honlap", "oldalon", "website"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Vector,
    Keyword,
    Scrape,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub chunks: Vec<RetrievedChunk>,
    pub source: ContextSource,
    /// Tag filter of the pass that produced `chunks`; empty when unfiltered.
    pub filter_tags: Vec<String>,
}

impl RetrievalOutcome {
    fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            source: ContextSource::None,
            filter_tags: Vec::new(),
        }
    }
}

pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    scraper: Arc<dyn PageScraper>,
    config: RetrievalConfig,
    site_host: Option<String>,
}

impl RetrievalOrchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
        scraper: Arc<dyn PageScraper>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            scraper,
            config,
            site_host: None,
        }
    }

    pub fn with_site_host(mut self, host: Option<&str>) -> Self {
        self.site_host = host.map(normalize);
        self
    }

    fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stage_timeout_secs.max(1))
    }

    /// Runs one stage under the per-stage deadline. A timeout or an error
    /// is logged and reported as `None`.
    async fn stage<T, E, F>(&self, name: &str, fut: F) -> Option<T>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        self.stage_within(name, self.stage_timeout(), fut).await
    }

    async fn stage_within<T, E, F>(&self, name: &str, deadline: Duration, fut: F) -> Option<T>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match timeout(deadline, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                tracing::warn!("Retrieval stage '{}' failed: {}", name, err);
                None
            }
            Err(_) => {
                tracing::warn!("Retrieval stage '{}' timed out after {:?}", name, deadline);
                None
            }
        }
    }

    pub async fn retrieve(&self, detection: &Detection) -> RetrievalOutcome {
        let query = detection.expanded_query.as_str();

        if let Some(outcome) = self.vector_pass(detection).await {
            return outcome;
        }

        if let Some(chunks) = self.keyword_pass(query).await {
            return RetrievalOutcome {
                chunks,
                source: ContextSource::Keyword,
                filter_tags: Vec::new(),
            };
        }

        if self.should_scrape(detection) {
            if let Some(text) = self.stage("scrape", self.scraper.fetch_text()).await {
                tracing::info!("Using scraped site text as context");
                return RetrievalOutcome {
                    chunks: vec![RetrievedChunk {
                        id: WEB_SCRAPING_TAG.to_string(),
                        content: text,
                        tags: vec![WEB_SCRAPING_TAG.to_string()],
                        similarity: None,
                        metadata: json!({ "source": "scrape" }),
                    }],
                    source: ContextSource::Scrape,
                    filter_tags: Vec::new(),
                };
            }
        }

        tracing::info!("No context found for query");
        RetrievalOutcome::empty()
    }

    async fn vector_pass(&self, detection: &Detection) -> Option<RetrievalOutcome> {
        // The embedder may walk several keys; give it room for all of them.
        let embed_deadline = self
            .embedder
            .max_duration()
            .map_or(self.stage_timeout(), |budget| budget.max(self.stage_timeout()));
        let embedding = self
            .stage_within(
                "embed",
                embed_deadline,
                self.embedder.embed(&detection.expanded_query),
            )
            .await?;

        let match_count = if detection.speaker.is_some() {
            self.config.speaker_match_count
        } else {
            self.config.default_match_count
        };

        let filter: Vec<String> = detection
            .topic
            .filter_tags()
            .iter()
            .map(|tag| tag.to_string())
            .collect();

        let first = if filter.is_empty() {
            self.stage(
                "vector",
                self.store.match_chunks(&embedding, match_count, None),
            )
            .await
            .unwrap_or_default()
        } else {
            self.stage(
                "vector_filtered",
                self.store
                    .match_chunks(&embedding, match_count, Some(filter.as_slice())),
            )
            .await
            .unwrap_or_default()
        };
        let first_best = best_similarity(&first);
        tracing::debug!(
            "Vector pass: {} rows, best {:?}, filter {:?}",
            first.len(),
            first_best,
            filter
        );

        let below_threshold = first_best
            .map(|best| best < self.config.similarity_threshold)
            .unwrap_or(true);

        let (chunks, filter_tags) = if below_threshold && !filter.is_empty() {
            let second = self
                .stage(
                    "vector_unfiltered",
                    self.store.match_chunks(&embedding, match_count, None),
                )
                .await
                .unwrap_or_default();
            let second_best = best_similarity(&second);
            tracing::debug!(
                "Unfiltered pass: {} rows, best {:?}",
                second.len(),
                second_best
            );

            if second_best.unwrap_or(f32::MIN) > first_best.unwrap_or(f32::MIN) {
                (second, Vec::new())
            } else {
                (first, filter)
            }
        } else {
            (first, filter)
        };

        if chunks.is_empty() {
            return None;
        }

        Some(RetrievalOutcome {
            chunks,
            source: ContextSource::Vector,
            filter_tags,
        })
    }

    async fn keyword_pass(&self, query: &str) -> Option<Vec<RetrievedChunk>> {
        let keywords = extract_keywords(
            query,
            self.config.min_keyword_len,
            self.config.max_keywords,
        );
        if keywords.is_empty() {
            return None;
        }
        tracing::debug!("Keyword fallback with {:?}", keywords);

        let hits = self
            .stage(
                "keyword",
                self.store.keyword_search(&keywords, self.config.keyword_limit),
            )
            .await?;

        (!hits.is_empty()).then_some(hits)
    }

    /// The answer probably lives on the public site: it is mentioned
    /// explicitly, the topic is one the site covers, or a speaker was named.
    pub fn should_scrape(&self, detection: &Detection) -> bool {
        let normalized = normalize(&detection.expanded_query);
        let mentions_site = SITE_MENTIONS.iter().any(|word| normalized.contains(word))
            || self
                .site_host
                .as_deref()
                .is_some_and(|host| normalized.contains(host));

        mentions_site
            || matches!(
                detection.topic,
                Topic::Speaker | Topic::Program | Topic::Location
            )
            || detection.speaker.is_some()
    }
}
