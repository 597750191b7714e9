//! Last-resort context: the public event page as plain text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::text::truncate_chars;
use crate::core::config::ScrapeConfig;

const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "noscript", "svg", "nav", "head"];

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("scraping is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("site returned {0}")]
    Status(u16),
    #[error("page has no readable text")]
    EmptyPage,
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Plain text of the configured page, at most the configured char budget.
    async fn fetch_text(&self) -> Result<String, ScrapeError>;
}

pub struct SiteScraper {
    url: String,
    max_chars: usize,
    enabled: bool,
    client: Client,
}

impl SiteScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("aitalks-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            max_chars: config.max_chars,
            enabled: config.enabled,
            client,
        })
    }
}

#[async_trait]
impl PageScraper for SiteScraper {
    async fn fetch_text(&self) -> Result<String, ScrapeError> {
        if !self.enabled {
            return Err(ScrapeError::Disabled);
        }

        let res = self.client.get(&self.url).send().await?;
        if !res.status().is_success() {
            return Err(ScrapeError::Status(res.status().as_u16()));
        }

        let html = res.text().await?;
        let text = html_to_text(&html);
        if text.is_empty() {
            return Err(ScrapeError::EmptyPage);
        }

        tracing::debug!("Scraped {} chars from {}", text.chars().count(), self.url);
        Ok(truncate_chars(&text, self.max_chars))
    }
}

/// Visible text of the main content area, whitespace-collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = pick_root(&document);

    let mut pieces: Vec<String> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_TAGS.contains(&element.name()))
        });
        if hidden {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            pieces.push(collapsed);
        }
    }

    pieces.join(" ")
}

fn pick_root(document: &Html) -> ElementRef<'_> {
    ["article", "main", "body"]
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element())
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
