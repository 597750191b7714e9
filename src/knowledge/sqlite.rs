//! SQLite-backed knowledge store.
//!
//! Items and chunks live in two tables; embeddings are little-endian f32
//! BLOBs scored by brute-force cosine similarity. The knowledge base is a
//! few hundred chunks, so a full scan per query is fine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use super::store::{KnowledgeChunk, KnowledgeItem, KnowledgeStore, RetrievedChunk, StoreError};
use crate::chat::text::normalize;

/// Opens (and creates when missing) the SQLite database shared by the
/// knowledge store and the interaction log.
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(4)
        .connect_with(options)
        .await
}

pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    dimensions: usize,
}

impl SqliteKnowledgeStore {
    pub async fn with_path(db_path: PathBuf, dimensions: usize) -> Result<Self, StoreError> {
        let pool = open_pool(&db_path).await?;
        Self::with_pool(pool, dimensions).await
    }

    pub async fn with_pool(pool: SqlitePool, dimensions: usize) -> Result<Self, StoreError> {
        let store = Self { pool, dimensions };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_items (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source_url TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_items_source ON knowledge_items(source_url)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_chunks (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES knowledge_items(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                content_folded TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                embedding BLOB NOT NULL,
                position INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_chunks_item ON knowledge_chunks(item_id, position)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &SqliteRow, similarity: Option<f32>) -> RetrievedChunk {
        let tags_str: String = row.get("tags");
        let metadata_str: String = row.get("metadata");

        RetrievedChunk {
            id: row.get("id"),
            content: row.get("content"),
            tags: serde_json::from_str(&tags_str).unwrap_or_default(),
            similarity,
            metadata: serde_json::from_str(&metadata_str).unwrap_or(Value::Null),
        }
    }

    fn shares_tag(chunk_tags: &[String], filter: &HashSet<String>) -> bool {
        chunk_tags
            .iter()
            .any(|tag| filter.contains(&tag.to_lowercase()))
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn replace_item(
        &self,
        item: &KnowledgeItem,
        chunks: &[KnowledgeChunk],
    ) -> Result<usize, StoreError> {
        for chunk in chunks {
            self.check_dimensions(&chunk.embedding)?;
        }

        let mut tx = self.pool.begin().await?;

        let source_url = item
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        let replaced = match source_url {
            Some(url) => sqlx::query("DELETE FROM knowledge_items WHERE source_url = ?1")
                .bind(url)
                .execute(&mut *tx)
                .await?
                .rows_affected() as usize,
            None => 0,
        };

        sqlx::query(
            "INSERT INTO knowledge_items (id, title, source_url, metadata) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(source_url)
        .bind(serde_json::to_string(&item.metadata)?)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO knowledge_chunks
                    (id, item_id, content, content_folded, tags, embedding, position, token_count, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&chunk.id)
            .bind(&item.id)
            .bind(&chunk.content)
            .bind(normalize(&chunk.content))
            .bind(serde_json::to_string(&chunk.tags)?)
            .bind(Self::serialize_embedding(&chunk.embedding))
            .bind(chunk.position as i64)
            .bind(chunk.token_count as i64)
            .bind(serde_json::to_string(&chunk.metadata)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(replaced)
    }

    async fn match_chunks(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        filter_tags: Option<&[String]>,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        self.check_dimensions(query_embedding)?;

        let filter: Option<HashSet<String>> = filter_tags
            .filter(|tags| !tags.is_empty())
            .map(|tags| tags.iter().map(|tag| tag.to_lowercase()).collect());

        let rows = sqlx::query(
            "SELECT id, content, tags, embedding, metadata
             FROM knowledge_chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<RetrievedChunk> = rows
            .iter()
            .filter_map(|row| {
                let tags_str: String = row.get("tags");
                if let Some(filter) = &filter {
                    let tags: Vec<String> = serde_json::from_str(&tags_str).unwrap_or_default();
                    if !Self::shares_tag(&tags, filter) {
                        return None;
                    }
                }

                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored);
                Some(Self::row_to_chunk(row, Some(score)))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count.max(1));

        Ok(scored)
    }

    async fn keyword_search(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let patterns: Vec<String> = keywords
            .iter()
            .map(|keyword| normalize(keyword))
            .filter(|keyword| !keyword.is_empty())
            .collect();
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let clause = (1..=patterns.len())
            .map(|idx| format!("content_folded LIKE ?{}", idx))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT id, content, content_folded, tags, metadata
             FROM knowledge_chunks
             WHERE {}
             ORDER BY created_at, position",
            clause
        );

        let mut query = sqlx::query(&sql);
        for pattern in &patterns {
            query = query.bind(format!("%{}%", pattern));
        }
        let rows = query.fetch_all(&self.pool).await?;

        // Chunks containing more of the keywords rank first.
        let mut hits: Vec<(usize, RetrievedChunk)> = rows
            .iter()
            .map(|row| {
                let folded: String = row.get("content_folded");
                let matched = patterns
                    .iter()
                    .filter(|pattern| folded.contains(pattern.as_str()))
                    .count();
                (matched, Self::row_to_chunk(row, None))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(hits
            .into_iter()
            .take(limit.max(1))
            .map(|(_, chunk)| chunk)
            .collect())
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn item_count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store(dimensions: usize) -> SqliteKnowledgeStore {
        let tmp = std::env::temp_dir().join(format!(
            "aitalks-knowledge-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        SqliteKnowledgeStore::with_path(tmp, dimensions)
            .await
            .unwrap()
    }

    fn item(id: &str, source_url: Option<&str>) -> KnowledgeItem {
        KnowledgeItem {
            id: id.to_string(),
            title: format!("item {id}"),
            source_url: source_url.map(str::to_string),
            metadata: json!({}),
        }
    }

    fn chunk(id: &str, item_id: &str, content: &str, tags: &[&str], embedding: Vec<f32>) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            item_id: item_id.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            embedding,
            position: 0,
            token_count: content.len().div_ceil(4),
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn insert_and_match() {
        let store = test_store(3).await;
        store
            .replace_item(
                &item("i1", None),
                &[
                    chunk("c1", "i1", "Early Bird 89.000 Ft", &["jegyek"], vec![1.0, 0.0, 0.0]),
                    chunk("c2", "i1", "Bálna mélygarázs", &["parkolas"], vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.match_chunks(&[1.0, 0.1, 0.0], 10, None).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "c1");
        assert!(results[0].score() > 0.99);
        assert_eq!(results[0].tags, vec!["jegyek"]);
        assert_eq!(store.chunk_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn tag_filter_requires_overlap() {
        let store = test_store(2).await;
        store
            .replace_item(
                &item("i1", None),
                &[
                    chunk("c1", "i1", "jegy", &["jegyek", "early-bird"], vec![1.0, 0.0]),
                    chunk("c2", "i1", "parkolás", &["parkolas"], vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let filter = vec!["Early-Bird".to_string(), "vip".to_string()];
        let results = store
            .match_chunks(&[1.0, 0.0], 10, Some(filter.as_slice()))
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1"]);
    }

    #[tokio::test]
    async fn match_count_limits_results() {
        let store = test_store(2).await;
        let chunks: Vec<KnowledgeChunk> = (0..6)
            .map(|i| chunk(&format!("c{i}"), "i1", "x", &["program"], vec![1.0, i as f32]))
            .collect();
        store.replace_item(&item("i1", None), &chunks).await.unwrap();

        let results = store.match_chunks(&[1.0, 0.0], 4, None).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].id, "c0");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = test_store(3).await;

        let insert = store
            .replace_item(&item("i1", None), &[chunk("c1", "i1", "x", &[], vec![1.0])])
            .await;
        assert!(matches!(
            insert,
            Err(StoreError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
        assert_eq!(store.item_count().await.unwrap(), 0);

        let query = store.match_chunks(&[1.0, 0.0], 5, None).await;
        assert!(matches!(query, Err(StoreError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn same_source_url_replaces_item_and_chunks() {
        let store = test_store(2).await;
        let url = Some("https://aitalks.hu/program");

        store
            .replace_item(
                &item("old", url),
                &[
                    chunk("a", "old", "régi", &[], vec![1.0, 0.0]),
                    chunk("b", "old", "régi 2", &[], vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let replaced = store
            .replace_item(&item("new", url), &[chunk("c", "new", "új", &[], vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(replaced, 1);
        assert_eq!(store.item_count().await.unwrap(), 1);
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn items_without_source_url_accumulate() {
        let store = test_store(2).await;
        store.replace_item(&item("a", None), &[]).await.unwrap();
        store.replace_item(&item("b", Some("  ")), &[]).await.unwrap();
        store.replace_item(&item("c", None), &[]).await.unwrap();

        assert_eq!(store.item_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn keyword_search_is_accent_insensitive_and_ranked() {
        let store = test_store(2).await;
        store
            .replace_item(
                &item("i1", None),
                &[
                    chunk("c1", "i1", "Parkolás a Bálna mélygarázsban", &[], vec![1.0, 0.0]),
                    chunk("c2", "i1", "Jegyárak és parkolás díja", &[], vec![1.0, 0.0]),
                    chunk("c3", "i1", "Workshopok délután", &[], vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let keywords = vec!["parkolas".to_string(), "dija".to_string()];
        let results = store.keyword_search(&keywords, 5).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert!(results.iter().all(|c| c.similarity.is_none()));

        assert!(store.keyword_search(&[], 5).await.unwrap().is_empty());
    }
}
