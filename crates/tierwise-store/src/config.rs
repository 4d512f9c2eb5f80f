//! Patch store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Vector store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Binary store file
    pub data_file_path: PathBuf,

    /// Embedding dimension every patch must have
    pub vector_dim: usize,

    /// Live patch count that triggers compaction after an append
    pub compaction_threshold: usize,

    /// Patches always kept per tier, regardless of weight
    pub min_retention: usize,

    /// Effective weight below which compaction drops a patch
    pub death_threshold: f64,

    /// Effective weight below which a patch is ignored by queries
    pub live_weight_epsilon: f64,

    /// Minimum similarity for a patch to count as a match
    pub patch_similarity_threshold: f32,

    /// Similarity at which compaction merges two patches (defaults to the match threshold)
    pub merge_similarity_threshold: Option<f32>,

    /// Confidence multiplier applied when only the nearest patch matches
    pub single_match_discount: f32,
}

impl VectorStoreConfig {
    pub fn new() -> Self {
        Self {
            data_file_path: PathBuf::from("tierwise/patches.bin"),
            vector_dim: 1536,
            compaction_threshold: 500,
            min_retention: 5,
            death_threshold: 0.1,
            live_weight_epsilon: 0.01,
            patch_similarity_threshold: 0.85,
            merge_similarity_threshold: None,
            single_match_discount: 0.8,
        }
    }

    pub fn merge_threshold(&self) -> f32 {
        self.merge_similarity_threshold
            .unwrap_or(self.patch_similarity_threshold)
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_threshold_defaults_to_match_threshold() {
        let mut config = VectorStoreConfig::new();
        assert_eq!(config.merge_threshold(), 0.85);
        config.merge_similarity_threshold = Some(0.95);
        assert_eq!(config.merge_threshold(), 0.95);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VectorStoreConfig =
            serde_json::from_str(r#"{"vector_dim": 8, "min_retention": 2}"#).unwrap();
        assert_eq!(config.vector_dim, 8);
        assert_eq!(config.min_retention, 2);
        assert_eq!(config.compaction_threshold, 500);
    }
}
