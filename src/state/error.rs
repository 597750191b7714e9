use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to load event profile: {0}")]
    Profile(#[source] anyhow::Error),

    #[error("Failed to open knowledge store: {0}")]
    Knowledge(#[source] anyhow::Error),

    #[error("Failed to open interaction log: {0}")]
    Interactions(#[source] anyhow::Error),

    #[error("Failed to initialize LLM clients: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize site scraper: {0}")]
    Scraper(#[source] anyhow::Error),
}
