pub mod compact;
pub mod config;
pub mod inspect;
pub mod route;
pub mod version;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tierwise_core::{DnaRegistry, Router, SmartRouterConfig};
use tierwise_embed::{EmbeddingClient, HttpEmbedder};
use tierwise_store::PatchStore;

/// Overrides `vector_store.data_file_path`
pub const STORE_ENV: &str = "TIERWISE_STORE";

/// Load `path` (or defaults) and apply environment overrides
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SmartRouterConfig> {
    let mut config = match path {
        Some(path) => SmartRouterConfig::from_json_file(path)?,
        None => SmartRouterConfig::new(),
    };
    if let Some(store) = std::env::var_os(STORE_ENV).filter(|v| !v.is_empty()) {
        config.vector_store.data_file_path = PathBuf::from(store);
    }
    config.validate()?;
    Ok(config)
}

pub fn open_store(config: &SmartRouterConfig) -> Arc<PatchStore> {
    Arc::new(PatchStore::open(
        config.vector_store.clone(),
        config.time_decay,
    ))
}

pub fn load_dna(config: &SmartRouterConfig) -> anyhow::Result<DnaRegistry> {
    let dim = config.vector_store.vector_dim;
    match &config.dna_file_path {
        Some(path) => DnaRegistry::load(path, dim)
            .with_context(|| format!("loading DNA intents from {}", path.display())),
        None => Ok(DnaRegistry::empty(dim)),
    }
}

pub fn build_router(config: &SmartRouterConfig, offline: bool) -> anyhow::Result<Router> {
    let store = open_store(config);
    let dna = Arc::new(load_dna(config)?);
    let router = Router::new(config.clone(), store, dna);
    if offline {
        return Ok(router);
    }

    let provider = HttpEmbedder::from_config(&config.embedding)?;
    let client = EmbeddingClient::new(
        Arc::new(provider),
        config.embedding.clone(),
        config.vector_store.vector_dim,
    );
    Ok(router.with_embedder(client))
}
