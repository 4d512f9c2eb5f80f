use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration problems. These are fatal: the router refuses to
/// start rather than route with invalid settings or intents.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid router config: {0}")]
    Invalid(String),
    #[error("DNA config has no intents")]
    EmptyDna,
    #[error("DNA intent {id} has dimension {found}, expected {expected}")]
    DnaDimension {
        id: String,
        expected: usize,
        found: usize,
    },
    #[error("DNA intent {id} has a zero or non-finite centroid")]
    DnaCentroid { id: String },
    #[error("duplicate DNA intent id {0}")]
    DuplicateIntent(String),
}
