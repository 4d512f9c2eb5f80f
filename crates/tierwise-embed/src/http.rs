//! OpenAI-compatible embeddings endpoint

use crate::client::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::EmbedError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn first_embedding(body: EmbeddingResponse) -> Result<Vec<f32>, EmbedError> {
    body.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| EmbedError::Malformed("response has no data".to_string()))
}

pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self {
            client,
            url: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({
            "model": self.model,
            "input": text,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Provider(format!(
                "{} returned {}",
                self.url, status
            )));
        }
        first_embedding(response.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,-0.2]}],"model":"m","usage":{"prompt_tokens":2,"total_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(first_embedding(body).unwrap(), vec![0.1, -0.2]);
    }

    #[test]
    fn test_empty_data_is_malformed() {
        let body: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(first_embedding(body), Err(EmbedError::Malformed(_))));
    }

    #[test]
    fn test_url_joins_endpoint() {
        let config = EmbeddingConfig {
            endpoint: "http://localhost:8080/v1/".to_string(),
            ..EmbeddingConfig::new()
        };
        let embedder = HttpEmbedder::from_config(&config).unwrap();
        assert_eq!(embedder.url(), "http://localhost:8080/v1/embeddings");
    }
}
