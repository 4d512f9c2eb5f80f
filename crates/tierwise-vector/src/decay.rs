//! Exponential time decay for patch weights

use serde::{Deserialize, Serialize};

const DEFAULT_HALF_LIFE_DAYS: f64 = 14.0;

/// Half-life based decay: `w(t) = w0 * exp(-gamma * t)`, `gamma = ln 2 / half_life`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDecay {
    pub half_life_days: f64,
}

impl TimeDecay {
    pub fn new(half_life_days: f64) -> Self {
        Self { half_life_days }
    }

    /// Decay constant per day. Zero when the half-life is not a positive number.
    pub fn gamma(&self) -> f64 {
        if self.half_life_days.is_finite() && self.half_life_days > 0.0 {
            std::f64::consts::LN_2 / self.half_life_days
        } else {
            0.0
        }
    }

    /// Multiplier applied to a weight after `age_days`
    pub fn factor(&self, age_days: f64) -> f64 {
        (-self.gamma() * age_days.max(0.0)).exp()
    }

    pub fn apply(&self, initial_weight: f64, age_days: f64) -> f64 {
        initial_weight * self.factor(age_days)
    }
}

impl Default for TimeDecay {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_LIFE_DAYS)
    }
}
