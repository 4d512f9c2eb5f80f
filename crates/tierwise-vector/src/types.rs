//! Core types for tier routing

use crate::decay::TimeDecay;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model cost/capability tier a query is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Expensive, most capable model
    Flagship,
    /// Cheap, fast model
    Lightweight,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Flagship, Tier::Lightweight];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Flagship => "flagship",
            Tier::Lightweight => "lightweight",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flagship" => Ok(Tier::Flagship),
            "lightweight" => Ok(Tier::Lightweight),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Drop sub-millisecond precision so a timestamp survives the on-disk format
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// One learned routing example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Unit-normalized embedding of the example text
    pub vector: Vec<f32>,
    pub tier: Tier,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    /// Weight at creation time, in (0, 1]
    pub initial_weight: f32,
}

impl Patch {
    pub fn new(
        vector: Vec<f32>,
        tier: Tier,
        label: impl Into<String>,
        timestamp: DateTime<Utc>,
        initial_weight: f32,
    ) -> Self {
        Self {
            vector,
            tier,
            label: label.into(),
            timestamp: truncate_to_millis(timestamp),
            initial_weight,
        }
    }

    /// Age in fractional days, clamped at zero for timestamps in the future
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.timestamp).num_milliseconds().max(0);
        millis as f64 / 86_400_000.0
    }

    pub fn effective_weight(&self, decay: &TimeDecay, now: DateTime<Utc>) -> f64 {
        decay.apply(self.initial_weight as f64, self.age_days(now))
    }
}
