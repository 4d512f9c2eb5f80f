//! Tier routing decisions: override prefixes, learned patches, DNA intents, keywords

mod config;
mod dna;
mod error;
mod keyword;
mod learning;
mod prefix;
mod router;
mod types;

pub use config::{SelfReinforcementConfig, SmartRouterConfig};
pub use dna::{DnaConfig, DnaIntent, DnaMatch, DnaRegistry};
pub use error::ConfigError;
pub use keyword::{default_keyword_rules, KeywordMatcher, KeywordRule};
pub use prefix::{detect_prefix, PrefixConfig};
pub use router::Router;
pub use types::{MatchSource, PatchSearchResult, RoutingDecision};

pub use tierwise_vector::{Patch, Tier};
