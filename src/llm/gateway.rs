//! OpenAI-compatible chat-completion client for the hosted AI gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::error::LlmError;
use super::types::{Completion, CompletionRequest};
use crate::core::config::LlmConfig;

/// One credential's view of a chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Sends one completion request. 429 and 402 come back as
    /// [`Completion::RateLimited`] and [`Completion::PaymentRequired`];
    /// every other failure is an error.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

#[derive(Clone)]
pub struct GatewayClient {
    name: String,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

impl GatewayClient {
    pub fn new(config: &LlmConfig, api_key: String, name: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            name: name.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    /// One client per configured key, in failover order.
    pub fn from_config(config: &LlmConfig) -> Result<Vec<Self>, LlmError> {
        config
            .api_keys
            .iter()
            .filter(|key| !key.trim().is_empty())
            .enumerate()
            .map(|(index, key)| {
                let name = if index == 0 {
                    "gateway-primary".to_string()
                } else {
                    format!("gateway-alternate-{}", index)
                };
                Self::new(config, key.trim().to_string(), name)
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for GatewayClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": request.messages(),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        match res.status() {
            StatusCode::TOO_MANY_REQUESTS => return Ok(Completion::RateLimited),
            StatusCode::PAYMENT_REQUIRED => return Ok(Completion::PaymentRequired),
            status if !status.is_success() => {
                let text = res.text().await.unwrap_or_default();
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }
            _ => {}
        }

        let payload: Value = res.json().await?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmError::Empty);
        }

        Ok(Completion::Text(content))
    }
}
