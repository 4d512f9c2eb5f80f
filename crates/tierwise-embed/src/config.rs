//! Embedding provider configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API (`/embeddings` is appended)
    pub endpoint: String,

    pub model: String,

    /// Environment variable holding the bearer token
    pub api_key_env: String,

    /// Per-attempt deadline
    pub timeout_ms: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry, doubled for each further retry
    pub retry_backoff_ms: u64,
}

impl EmbeddingConfig {
    pub fn new() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 3000,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::new()
    }
}
