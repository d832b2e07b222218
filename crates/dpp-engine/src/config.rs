use std::time::Duration;

use dpp_types::DIGITAL_TWIN_STATUS;
use serde::{Deserialize, Serialize};

/// Exponential backoff parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base_ms: u64,
    /// Upper bound for any single delay.
    pub max_ms: u64,
    pub multiplier: f64,
    /// Relative random spread applied to each delay, `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Configuration for the reconciliation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wait between cycles when the last batch was not full.
    pub poll_interval_ms: u64,
    /// Upper bound for every ledger call.
    pub ledger_timeout_ms: u64,
    /// Maximum events fetched per cycle.
    pub batch_size: usize,
    /// Backoff while the ledger cannot be read.
    pub fetch_backoff: BackoffConfig,
    /// Backoff between anchoring attempts for one section hash.
    pub anchor_backoff: BackoffConfig,
    /// Attempts per section hash before an anchoring-pending warning is raised.
    pub anchor_max_attempts: u32,
    /// Re-read-and-reapply rounds after a store conflict.
    pub max_conflict_retries: u32,
    /// Status section refreshed from incoming events.
    pub status_section: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            ledger_timeout_ms: 10_000,
            batch_size: 100,
            fetch_backoff: BackoffConfig::default(),
            anchor_backoff: BackoffConfig {
                base_ms: 1_000,
                max_ms: 60_000,
                ..BackoffConfig::default()
            },
            anchor_max_attempts: 5,
            max_conflict_retries: 3,
            status_section: DIGITAL_TWIN_STATUS.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"poll_interval_ms": 50, "fetch_backoff": {"jitter": 0.0}}"#)
                .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.fetch_backoff.base_ms, 500);
        assert_eq!(config.fetch_backoff.jitter, 0.0);
        assert_eq!(config.status_section, "digital_twin_status");
    }
}
