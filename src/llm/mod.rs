pub mod embedding;
pub mod error;
pub mod gateway;
pub mod service;
pub mod types;

pub use embedding::{Embedder, GeminiEmbedder};
pub use error::LlmError;
pub use gateway::{ChatProvider, GatewayClient};
pub use service::LlmService;
pub use types::{ChatMessage, Completion, CompletionRequest, UpstreamErrorKind};
