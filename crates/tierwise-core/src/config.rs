//! Configuration for tier routing

use crate::error::ConfigError;
use crate::keyword::{default_keyword_rules, KeywordRule};
use crate::prefix::PrefixConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tierwise_embed::EmbeddingConfig;
use tierwise_store::VectorStoreConfig;
use tierwise_vector::{Tier, TimeDecay};

/// Learning from the router's own confident decisions. Off by default so a
/// systematic routing bias cannot reinforce itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfReinforcementConfig {
    pub enabled: bool,

    /// Initial weight of patches recorded from DNA/keyword decisions
    pub initial_weight: f32,

    /// Minimum decision confidence before a patch is recorded
    pub min_confidence: f32,
}

impl SelfReinforcementConfig {
    pub fn new() -> Self {
        Self {
            enabled: false,
            initial_weight: 0.25,
            min_confidence: 0.85,
        }
    }
}

impl Default for SelfReinforcementConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Router configuration. Immutable for the life of a loaded router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartRouterConfig {
    /// Patch store file, dimension, compaction and match thresholds
    pub vector_store: VectorStoreConfig,

    /// Patch weight half-life
    pub time_decay: TimeDecay,

    /// Embedding provider, timeout and retry budget
    pub embedding: EmbeddingConfig,

    /// Explicit override prefixes per tier
    pub prefixes: PrefixConfig,

    /// Ordered keyword table, first hit wins
    pub keywords: Vec<KeywordRule>,

    /// Precomputed intent centroids (JSON). None = no DNA matching.
    pub dna_file_path: Option<PathBuf>,

    /// Minimum cosine similarity for a DNA intent match
    pub dna_similarity_threshold: f32,

    /// Confidence reported for keyword decisions
    pub keyword_confidence: f32,

    pub default_flagship_model: String,

    pub default_lightweight_model: String,

    pub self_reinforcement: SelfReinforcementConfig,
}

impl SmartRouterConfig {
    pub fn new() -> Self {
        Self {
            vector_store: VectorStoreConfig::new(),
            time_decay: TimeDecay::default(),
            embedding: EmbeddingConfig::new(),
            prefixes: PrefixConfig::new(),
            keywords: default_keyword_rules(),
            dna_file_path: None,
            dna_similarity_threshold: 0.75,
            keyword_confidence: 0.6,
            default_flagship_model: "anthropic/claude-opus-4-6".to_string(),
            default_lightweight_model: "anthropic/claude-haiku-4-5".to_string(),
            self_reinforcement: SelfReinforcementConfig::new(),
        }
    }

    /// Read and validate a JSON config; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Flagship => &self.default_flagship_model,
            Tier::Lightweight => &self.default_lightweight_model,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.vector_store;
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };

        if store.vector_dim == 0 {
            return invalid("vector_store.vector_dim must be positive".to_string());
        }
        if store.compaction_threshold == 0 {
            return invalid("vector_store.compaction_threshold must be positive".to_string());
        }
        if store.data_file_path.as_os_str().is_empty() {
            return invalid("vector_store.data_file_path is empty".to_string());
        }
        if !(store.death_threshold.is_finite() && store.death_threshold >= 0.0) {
            return invalid(format!("death_threshold {} must be >= 0", store.death_threshold));
        }
        if !(store.live_weight_epsilon.is_finite() && store.live_weight_epsilon >= 0.0) {
            return invalid(format!(
                "live_weight_epsilon {} must be >= 0",
                store.live_weight_epsilon
            ));
        }

        let similarities = [
            ("patch_similarity_threshold", store.patch_similarity_threshold),
            ("merge_similarity_threshold", store.merge_threshold()),
            ("dna_similarity_threshold", self.dna_similarity_threshold),
        ];
        for (name, value) in similarities {
            if !(-1.0..=1.0).contains(&value) {
                return invalid(format!("{} {} must be within [-1, 1]", name, value));
            }
        }

        let unit_values = [
            ("single_match_discount", store.single_match_discount),
            ("keyword_confidence", self.keyword_confidence),
            ("self_reinforcement.min_confidence", self.self_reinforcement.min_confidence),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} {} must be within [0, 1]", name, value));
            }
        }
        let weight = self.self_reinforcement.initial_weight;
        if !(weight > 0.0 && weight <= 1.0) {
            return invalid(format!(
                "self_reinforcement.initial_weight {} must be within (0, 1]",
                weight
            ));
        }

        let half_life = self.time_decay.half_life_days;
        if !(half_life.is_finite() && half_life > 0.0) {
            return invalid(format!("half_life_days {} must be positive", half_life));
        }
        if self.embedding.timeout_ms == 0 {
            return invalid("embedding.timeout_ms must be positive".to_string());
        }
        if self.default_flagship_model.trim().is_empty()
            || self.default_lightweight_model.trim().is_empty()
        {
            return invalid("default models must be set for both tiers".to_string());
        }
        Ok(())
    }
}

impl Default for SmartRouterConfig {
    fn default() -> Self {
        Self::new()
    }
}
