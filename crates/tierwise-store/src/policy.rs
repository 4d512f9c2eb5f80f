//! Patch match policies

use serde::Serialize;
use tierwise_vector::{Patch, Tier};

/// A live patch scored against a query, ranked nearest first
#[derive(Debug, Clone, Copy)]
pub struct ScoredPatch<'a> {
    pub patch: &'a Patch,
    pub similarity: f32,
    /// Effective (decayed) weight at query time
    pub weight: f64,
}

impl ScoredPatch<'_> {
    /// Effective weight clamped to [0, 1]
    pub fn normalized_weight(&self) -> f32 {
        self.weight.clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The two nearest patches agree on tier and both clear the threshold
    Dual,
    /// Only the nearest patch clears the threshold
    Single,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchMatch {
    pub kind: MatchKind,
    pub tier: Tier,
    /// Nearest patch
    pub patch: Patch,
    pub similarity: f32,
    pub confidence: f32,
}

/// Turns ranked candidates into a match decision
pub trait MatchPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Number of nearest candidates the policy wants to see
    fn candidates(&self) -> usize {
        2
    }

    fn evaluate(&self, ranked: &[ScoredPatch<'_>]) -> Option<PatchMatch>;
}

/// Dual match beats single match; confidence is similarity scaled by weight
#[derive(Debug, Clone)]
pub struct DualSinglePolicy {
    pub similarity_threshold: f32,
    pub single_match_discount: f32,
}

impl DualSinglePolicy {
    pub fn new(similarity_threshold: f32, single_match_discount: f32) -> Self {
        Self {
            similarity_threshold,
            single_match_discount,
        }
    }
}

impl MatchPolicy for DualSinglePolicy {
    fn name(&self) -> &str {
        "dual-single"
    }

    fn evaluate(&self, ranked: &[ScoredPatch<'_>]) -> Option<PatchMatch> {
        let first = ranked.first()?;
        if first.similarity < self.similarity_threshold {
            return None;
        }

        if let Some(second) = ranked.get(1) {
            if second.patch.tier == first.patch.tier
                && second.similarity >= self.similarity_threshold
            {
                let confidence = (first.similarity * first.normalized_weight()
                    + second.similarity * second.normalized_weight())
                    / 2.0;
                return Some(PatchMatch {
                    kind: MatchKind::Dual,
                    tier: first.patch.tier,
                    patch: first.patch.clone(),
                    similarity: first.similarity,
                    confidence: confidence.clamp(0.0, 1.0),
                });
            }
        }

        let confidence =
            first.similarity * first.normalized_weight() * self.single_match_discount;
        Some(PatchMatch {
            kind: MatchKind::Single,
            tier: first.patch.tier,
            patch: first.patch.clone(),
            similarity: first.similarity,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}
