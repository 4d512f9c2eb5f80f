//! Static keyword to tier table

use serde::{Deserialize, Serialize};
use tierwise_vector::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub tier: Tier,
}

const DEFAULT_KEYWORDS: &[(&str, Tier)] = &[
    ("step by step", Tier::Flagship),
    ("architecture", Tier::Flagship),
    ("prove", Tier::Flagship),
    ("refactor", Tier::Flagship),
    ("debug", Tier::Flagship),
    ("optimize", Tier::Flagship),
    ("analyze", Tier::Flagship),
    ("security review", Tier::Flagship),
    ("trade-off", Tier::Flagship),
    ("translate", Tier::Lightweight),
    ("summarize", Tier::Lightweight),
    ("summarise", Tier::Lightweight),
    ("tl;dr", Tier::Lightweight),
    ("rephrase", Tier::Lightweight),
    ("typo", Tier::Lightweight),
    ("weather", Tier::Lightweight),
    ("what time", Tier::Lightweight),
];

pub fn default_keyword_rules() -> Vec<KeywordRule> {
    DEFAULT_KEYWORDS
        .iter()
        .map(|&(keyword, tier)| KeywordRule {
            keyword: keyword.to_string(),
            tier,
        })
        .collect()
}

/// Ordered substring matcher; the first declared keyword found in the text wins
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    rules: Vec<(String, Tier)>,
}

impl KeywordMatcher {
    pub fn new(rules: &[KeywordRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| (rule.keyword.trim().to_lowercase(), rule.tier))
            .filter(|(keyword, _)| !keyword.is_empty())
            .collect();
        Self { rules }
    }

    pub fn find(&self, text: &str) -> Option<(&str, Tier)> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(keyword, tier)| (keyword.as_str(), *tier))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_matches() {
        let matcher = KeywordMatcher::new(&default_keyword_rules());
        assert_eq!(
            matcher.find("Please TRANSLATE this to French"),
            Some(("translate", Tier::Lightweight))
        );
        assert_eq!(
            matcher.find("help me refactor the parser"),
            Some(("refactor", Tier::Flagship))
        );
        assert_eq!(matcher.find("hello"), None);
    }

    #[test]
    fn test_declaration_order_wins() {
        let rules = vec![
            KeywordRule {
                keyword: "summarize".to_string(),
                tier: Tier::Lightweight,
            },
            KeywordRule {
                keyword: "architecture".to_string(),
                tier: Tier::Flagship,
            },
        ];
        let matcher = KeywordMatcher::new(&rules);
        assert_eq!(
            matcher.find("summarize the architecture doc"),
            Some(("summarize", Tier::Lightweight))
        );
    }

    #[test]
    fn test_empty_keywords_dropped() {
        let rules = vec![KeywordRule {
            keyword: "  ".to_string(),
            tier: Tier::Flagship,
        }];
        let matcher = KeywordMatcher::new(&rules);
        assert!(matcher.is_empty());
        assert_eq!(matcher.find("anything"), None);
    }
}
