//! Embedding client with bounded latency

mod client;
mod config;
mod error;
mod http;

pub use client::{Embedder, EmbeddingClient, DEFAULT_MAX_IN_FLIGHT};
pub use config::EmbeddingConfig;
pub use error::EmbedError;
pub use http::HttpEmbedder;
