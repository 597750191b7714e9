pub mod chunker;
pub mod ingest;
pub mod sqlite;
pub mod store;

pub use ingest::{IngestError, IngestReport, IngestRequest, IngestService};
pub use sqlite::{open_pool, SqliteKnowledgeStore};
pub use store::{
    best_similarity, KnowledgeChunk, KnowledgeItem, KnowledgeStore, RetrievedChunk, StoreError,
};
