use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the cross-link coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Earliest accepted case year.
    pub min_year: i64,
    /// Latest accepted case year.
    pub max_year: i64,
    /// Largest accepted case sequence number.
    pub max_sequence: i64,
    /// Quiet period before the auto-link matcher is queried, in milliseconds.
    pub suggestion_settle_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            min_year: 1900,
            max_year: 2100,
            max_sequence: 99_999,
            suggestion_settle_ms: 700,
        }
    }
}

impl CoordinatorConfig {
    pub fn suggestion_settle(&self) -> Duration {
        Duration::from_millis(self.suggestion_settle_ms)
    }
}
