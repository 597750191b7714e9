use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("upstream returned no content")]
    Empty,
    #[error("no answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("no credentials configured")]
    NoCredentials,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },
}
