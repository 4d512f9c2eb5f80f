//! Precomputed intent centroids ("DNA") used as a second-chance classifier

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use tierwise_vector::{cosine_similarity, normalize, Tier};

fn default_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnaIntent {
    pub id: String,
    pub name: String,
    pub preferred_tier: Tier,
    pub centroid: Vec<f32>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub sample_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnaConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    pub intents: Vec<DnaIntent>,
}

#[derive(Debug, Clone, Copy)]
pub struct DnaMatch<'a> {
    pub intent: &'a DnaIntent,
    pub similarity: f32,
}

/// Validated intent set. Read-only after load.
#[derive(Debug, Clone)]
pub struct DnaRegistry {
    version: String,
    vector_dim: usize,
    intents: Vec<DnaIntent>,
}

impl DnaRegistry {
    /// Registry that never matches, for deployments without a DNA file
    pub fn empty(vector_dim: usize) -> Self {
        Self {
            version: String::new(),
            vector_dim,
            intents: Vec::new(),
        }
    }

    pub fn from_config(config: DnaConfig, vector_dim: usize) -> Result<Self, ConfigError> {
        if config.intents.is_empty() {
            return Err(ConfigError::EmptyDna);
        }

        let mut seen = HashSet::new();
        let mut intents = Vec::with_capacity(config.intents.len());
        for mut intent in config.intents {
            if !seen.insert(intent.id.clone()) {
                return Err(ConfigError::DuplicateIntent(intent.id));
            }
            if intent.centroid.len() != vector_dim {
                return Err(ConfigError::DnaDimension {
                    id: intent.id,
                    expected: vector_dim,
                    found: intent.centroid.len(),
                });
            }
            if !normalize(&mut intent.centroid) {
                return Err(ConfigError::DnaCentroid { id: intent.id });
            }
            intents.push(intent);
        }

        Ok(Self {
            version: config.version,
            vector_dim,
            intents,
        })
    }

    pub fn load(path: &Path, vector_dim: usize) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DnaConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_config(config, vector_dim)
    }

    /// Nearest intent at or above `threshold`
    pub fn find(&self, query: &[f32], threshold: f32) -> Option<DnaMatch<'_>> {
        if query.len() != self.vector_dim {
            return None;
        }
        self.intents
            .iter()
            .map(|intent| DnaMatch {
                intent,
                similarity: cosine_similarity(query, &intent.centroid),
            })
            .filter(|m| m.similarity >= threshold)
            .max_by(|a, b| {
                a.similarity
                    .partial_cmp(&b.similarity)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.intent.sample_count.cmp(&b.intent.sample_count))
                    .then_with(|| b.intent.id.cmp(&a.intent.id))
            })
    }

    pub fn intents(&self) -> &[DnaIntent] {
        &self.intents
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}
