#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tierwise_core::{DnaRegistry, Router, SmartRouterConfig};
use tierwise_embed::{EmbedError, Embedder, EmbeddingClient};
use tierwise_store::{PatchStore, VectorStoreConfig};

pub const DIM: usize = 16;

pub fn one_hot(dim: usize, i: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[i] = 1.0;
    v
}

/// Maps known texts to one-hot vectors, fails for anything else
pub struct TableEmbedder {
    entries: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, usize)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(text, i)| (text.to_string(), one_hot(DIM, *i)))
                .collect(),
        }
    }
}

impl Embedder for TableEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.entries
            .get(text)
            .cloned()
            .ok_or_else(|| EmbedError::Provider(format!("no embedding for {:?}", text)))
    }
}

/// Provider that is always down
pub struct DownEmbedder;

impl Embedder for DownEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Provider("connection refused".to_string()))
    }
}

pub fn store_config(dir: &Path, dim: usize) -> VectorStoreConfig {
    VectorStoreConfig {
        data_file_path: dir.join("patches.bin"),
        vector_dim: dim,
        ..VectorStoreConfig::new()
    }
}

pub fn router_config(dir: &Path) -> SmartRouterConfig {
    let mut config = SmartRouterConfig::new();
    config.vector_store = store_config(dir, DIM);
    config.embedding.max_retries = 0;
    config.embedding.timeout_ms = 500;
    config
}

pub fn build_router(config: &SmartRouterConfig, embedder: Arc<dyn Embedder>) -> Router {
    let store = Arc::new(PatchStore::open(
        config.vector_store.clone(),
        config.time_decay,
    ));
    let client = EmbeddingClient::new(embedder, config.embedding.clone(), DIM);
    Router::new(config.clone(), store, Arc::new(DnaRegistry::empty(DIM))).with_embedder(client)
}
