//! Engine tuning parameters
//!
//! Every threshold here was tuned empirically in production rather than
//! derived, so all of them are configuration with the proven values as
//! defaults.

use roundtable_domain::DeadlockConfig;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimits;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Hard cap on conversation length; reaching it forces a conclusion.
    pub max_turns: usize,
    /// A "none" from the moderator below this turn count concludes with
    /// "insufficient information" instead of waiting.
    pub min_turns_for_conclusion: usize,
    /// A "none" at or above this turn count concludes rather than stalling
    /// the meeting forever.
    pub stall_turns: usize,
    /// Persona responses shorter than this are discarded and the turn
    /// skipped.
    pub min_response_chars: usize,
    /// Trailing turns the fairness guard inspects.
    pub fairness_window: usize,
    /// Turns one speaker may hold within the window before being overridden.
    pub fairness_max_share: usize,
    /// Lifecycle driver tick interval.
    pub tick_interval_ms: u64,
    pub deadlock: DeadlockConfig,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_turns: 20,
            min_turns_for_conclusion: 3,
            stall_turns: 8,
            min_response_chars: 10,
            fairness_window: 5,
            fairness_max_share: 3,
            tick_interval_ms: 8_000,
            deadlock: DeadlockConfig::default(),
        }
    }
}

/// Everything the orchestration layer needs to run, bundled for loading
/// from one config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub engine: EngineParams,
    pub limits: RateLimits,
    pub retry: RetryPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = OrchestratorConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: OrchestratorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            [engine]
            max_turns = 12

            [limits]
            requests_per_minute = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_turns, 12);
        assert_eq!(config.engine.stall_turns, 8);
        assert_eq!(config.limits.requests_per_minute, 5);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
