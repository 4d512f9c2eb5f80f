use serde::Serialize;
use std::fmt;
use tierwise_vector::{Patch, Tier};

/// What produced a routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchSource {
    PatchDual,
    PatchSingle,
    Dna,
    Keyword,
    Override,
    Default,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::PatchDual => "patch-dual",
            MatchSource::PatchSingle => "patch-single",
            MatchSource::Dna => "dna",
            MatchSource::Keyword => "keyword",
            MatchSource::Override => "override",
            MatchSource::Default => "default",
        }
    }
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the patch, DNA and keyword cascade for one query
#[derive(Debug, Clone, Serialize)]
pub struct PatchSearchResult {
    pub found: bool,
    pub source: MatchSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    /// DNA intent id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub score: f32,
    pub tier: Tier,
}

impl PatchSearchResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            source: MatchSource::Default,
            patch: None,
            intent: None,
            keyword: None,
            score: 0.0,
            tier: Tier::Lightweight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub tier: Tier,
    pub selected_model: String,
    /// In [0, 1]
    pub confidence: f32,
    pub reasoning: String,
    pub source: MatchSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&MatchSource::PatchDual).unwrap(),
            "\"patch-dual\""
        );
        assert_eq!(MatchSource::PatchSingle.to_string(), "patch-single");
    }

    #[test]
    fn test_not_found_defaults_lightweight() {
        let result = PatchSearchResult::not_found();
        assert!(!result.found);
        assert_eq!(result.tier, Tier::Lightweight);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("patch").is_none());
    }
}
