//! Text embedding via the Gemini `embedContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::error::LlmError;
use crate::core::config::EmbeddingConfig;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed output size; every vector returned has exactly this length.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Worst-case time for one [`embed`](Self::embed) call, when bounded.
    fn max_duration(&self) -> Option<Duration> {
        None
    }
}

#[derive(Clone)]
pub struct GeminiEmbedder {
    base_url: String,
    model: String,
    api_keys: Vec<String>,
    dimensions: usize,
    attempt_timeout: Duration,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let attempt_timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder().timeout(attempt_timeout).build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
            api_keys: config
                .api_keys
                .iter()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .collect(),
            dimensions: config.dimensions,
            attempt_timeout,
            client,
        })
    }

    async fn embed_with_key(&self, text: &str, key: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url,
            self.model,
            urlencoding::encode(key)
        );

        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });

        let res = self.client.post(&url).json(&body).send().await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body: text });
        }

        let payload: Value = res.json().await?;
        let values = payload["embedding"]["values"]
            .as_array()
            .ok_or_else(|| LlmError::Decode("missing embedding.values".to_string()))?;

        let vector: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if vector.len() != self.dimensions {
            return Err(LlmError::Dimension {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Every key may be tried once, each bounded by the client timeout.
    fn max_duration(&self) -> Option<Duration> {
        Some(self.attempt_timeout * self.api_keys.len().max(1) as u32)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut last_error = LlmError::NoCredentials;

        for (index, key) in self.api_keys.iter().enumerate() {
            match self.embed_with_key(text, key).await {
                Ok(vector) => return Ok(vector),
                Err(err) => {
                    tracing::warn!("Embedding with key #{} failed: {}", index + 1, err);
                    last_error = err;
                }
            }
        }

        Err(last_error)
    }
}
