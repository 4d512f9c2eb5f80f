use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("malformed embedding: {0}")]
    Malformed(String),
    #[error("embedding unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },
}
