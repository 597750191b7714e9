//! KnowledgeStore trait: the read/write contract of the knowledge base.
//!
//! Retrieval only needs `match_chunks` and `keyword_search`; ingestion
//! writes whole items through `replace_item`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An ingested document; owns its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub metadata: Value,
}

/// A bounded slice of an item, stored with its own embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub item_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
    pub position: usize,
    pub token_count: usize,
    pub metadata: Value,
}

/// A chunk as seen by retrieval; `similarity` is set by vector search only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub similarity: Option<f32>,
    pub metadata: Value,
}

impl RetrievedChunk {
    pub fn score(&self) -> f32 {
        self.similarity.unwrap_or(0.0)
    }
}

/// Highest similarity among `chunks`, `None` when empty.
pub fn best_similarity(chunks: &[RetrievedChunk]) -> Option<f32> {
    chunks
        .iter()
        .map(RetrievedChunk::score)
        .fold(None, |best, score| match best {
            Some(current) if current >= score => Some(current),
            _ => Some(score),
        })
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Embedding size every stored and queried vector must have.
    fn dimensions(&self) -> usize;

    /// Stores `item` with its chunks. An existing item with the same
    /// non-empty `source_url` is deleted first, chunks included.
    /// Returns the number of replaced items.
    async fn replace_item(
        &self,
        item: &KnowledgeItem,
        chunks: &[KnowledgeChunk],
    ) -> Result<usize, StoreError>;

    /// Top `match_count` chunks by cosine similarity, restricted to chunks
    /// sharing at least one tag with `filter_tags` when given.
    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        filter_tags: Option<&[String]>,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Chunks whose folded content contains any of `keywords`.
    async fn keyword_search(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    async fn chunk_count(&self) -> Result<usize, StoreError>;

    async fn item_count(&self) -> Result<usize, StoreError>;
}
