//! Document ingestion: chunk, embed, store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use super::chunker::{chunk_content, estimate_tokens, MAX_CHUNK_CHARS};
use super::store::{KnowledgeChunk, KnowledgeItem, KnowledgeStore, StoreError};
use crate::llm::Embedder;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Missing required fields: title, content, tags")]
    MissingFields,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Body of an ingestion call. Fields are optional so that missing ones
/// are reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub item_id: String,
    pub chunks_created: usize,
}

#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn Embedder>,
}

impl IngestService {
    pub fn new(store: Arc<dyn KnowledgeStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport, IngestError> {
        let (Some(title), Some(content), Some(tags)) =
            (request.title, request.content, request.tags)
        else {
            return Err(IngestError::MissingFields);
        };
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(IngestError::MissingFields);
        }

        let tags: Vec<String> = tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        let item = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            source_url: request.source_url,
            metadata: request.metadata.unwrap_or_else(|| json!({})),
        };

        let pieces = chunk_content(&content, MAX_CHUNK_CHARS);
        let total = pieces.len();
        let mut chunks = Vec::with_capacity(total);

        for (position, piece) in pieces.into_iter().enumerate() {
            match self.embedder.embed(&piece).await {
                Ok(embedding) => chunks.push(KnowledgeChunk {
                    id: Uuid::new_v4().to_string(),
                    item_id: item.id.clone(),
                    token_count: estimate_tokens(&piece),
                    content: piece,
                    tags: tags.clone(),
                    embedding,
                    position,
                    metadata: json!({}),
                }),
                Err(err) => {
                    tracing::warn!(
                        "Skipping chunk {} of '{}': embedding failed: {}",
                        position,
                        item.title,
                        err
                    );
                }
            }
        }

        let replaced = self.store.replace_item(&item, &chunks).await?;
        tracing::info!(
            "Ingested '{}' as {} ({} of {} chunks embedded, {} item(s) replaced)",
            item.title,
            item.id,
            chunks.len(),
            total,
            replaced
        );

        Ok(IngestReport {
            success: true,
            item_id: item.id,
            chunks_created: chunks.len(),
        })
    }
}
