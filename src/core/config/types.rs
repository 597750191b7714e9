use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub event: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Empty means any origin; the widget is embedded on third-party pages.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "defaults::llm_base_url")]
    pub base_url: String,
    #[serde(default = "defaults::llm_model")]
    pub model: String,
    /// Ordered credentials: primary first, then the rate-limit alternate.
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "defaults::temperature")]
    pub temperature: f64,
    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "defaults::llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "defaults::history_turns")]
    pub history_turns: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::llm_base_url(),
            model: defaults::llm_model(),
            api_keys: Vec::new(),
            temperature: defaults::temperature(),
            max_tokens: defaults::max_tokens(),
            timeout_secs: defaults::llm_timeout_secs(),
            history_turns: defaults::history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "defaults::embedding_base_url")]
    pub base_url: String,
    #[serde(default = "defaults::embedding_model")]
    pub model: String,
    #[serde(default = "defaults::embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "defaults::embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::embedding_base_url(),
            model: defaults::embedding_model(),
            dimensions: defaults::embedding_dimensions(),
            api_keys: Vec::new(),
            timeout_secs: defaults::embedding_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "defaults::speaker_match_count")]
    pub speaker_match_count: usize,
    #[serde(default = "defaults::default_match_count")]
    pub default_match_count: usize,
    #[serde(default = "defaults::keyword_limit")]
    pub keyword_limit: usize,
    #[serde(default = "defaults::max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "defaults::min_keyword_len")]
    pub min_keyword_len: usize,
    #[serde(default = "defaults::prompt_context_limit")]
    pub prompt_context_limit: usize,
    #[serde(default = "defaults::stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl RetrievalConfig {
    /// Context entries that may reach the prompt, never above the hard ceiling.
    pub fn effective_context_limit(&self) -> usize {
        self.prompt_context_limit.clamp(1, defaults::MAX_PROMPT_CONTEXT)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::similarity_threshold(),
            speaker_match_count: defaults::speaker_match_count(),
            default_match_count: defaults::default_match_count(),
            keyword_limit: defaults::keyword_limit(),
            max_keywords: defaults::max_keywords(),
            min_keyword_len: defaults::min_keyword_len(),
            prompt_context_limit: defaults::prompt_context_limit(),
            stage_timeout_secs: defaults::stage_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "defaults::scrape_enabled")]
    pub enabled: bool,
    #[serde(default = "defaults::scrape_url")]
    pub url: String,
    #[serde(default = "defaults::scrape_max_chars")]
    pub max_chars: usize,
    #[serde(default = "defaults::scrape_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::scrape_enabled(),
            url: defaults::scrape_url(),
            max_chars: defaults::scrape_max_chars(),
            timeout_secs: defaults::scrape_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::database_file")]
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: defaults::database_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventConfig {
    /// Replaces the embedded event profile when set.
    #[serde(default)]
    pub profile_path: Option<String>,
}
