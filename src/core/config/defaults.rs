//! Default values for every configuration field.

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

pub const DEFAULT_LLM_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_LLM_MODEL: &str = "google/gemini-2.5-flash";

pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

pub const DEFAULT_SCRAPE_URL: &str = "https://aitalks.hu";

/// Hard ceiling on context entries rendered into the prompt.
pub const MAX_PROMPT_CONTEXT: usize = 5;

pub fn host() -> String {
    DEFAULT_HOST.to_string()
}

pub fn port() -> u16 {
    DEFAULT_PORT
}

pub fn llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

pub fn llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

pub fn temperature() -> f64 {
    0.7
}

pub fn max_tokens() -> u32 {
    1024
}

pub fn llm_timeout_secs() -> u64 {
    30
}

pub fn history_turns() -> usize {
    6
}

pub fn embedding_base_url() -> String {
    DEFAULT_EMBEDDING_BASE_URL.to_string()
}

pub fn embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

pub fn embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

pub fn embedding_timeout_secs() -> u64 {
    10
}

pub fn similarity_threshold() -> f32 {
    0.70
}

pub fn speaker_match_count() -> usize {
    30
}

pub fn default_match_count() -> usize {
    20
}

pub fn keyword_limit() -> usize {
    5
}

pub fn max_keywords() -> usize {
    5
}

pub fn min_keyword_len() -> usize {
    3
}

pub fn prompt_context_limit() -> usize {
    MAX_PROMPT_CONTEXT
}

pub fn stage_timeout_secs() -> u64 {
    12
}

pub fn scrape_enabled() -> bool {
    true
}

pub fn scrape_url() -> String {
    DEFAULT_SCRAPE_URL.to_string()
}

pub fn scrape_max_chars() -> usize {
    6000
}

pub fn scrape_timeout_secs() -> u64 {
    8
}

pub fn database_file() -> String {
    "aitalks.db".to_string()
}
