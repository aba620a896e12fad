//! File-based configuration schema
//!
//! One TOML file covering the orchestration parameters plus the model
//! connection. Every section and field is optional; missing values fall
//! back to the production defaults.

use roundtable_application::config::{EngineParams, OrchestratorConfig};
use roundtable_application::rate_limit::RateLimits;
use roundtable_application::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::model::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Complete configuration file schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: EngineParams,
    pub limits: RateLimits,
    pub retry: RetryPolicy,
    pub model: ModelConfig,
}

impl FileConfig {
    /// The slice of this file the orchestration layer consumes.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            engine: self.engine.clone(),
            limits: self.limits.clone(),
            retry: self.retry.clone(),
        }
    }
}

/// `[model]` section: provider connection and credentials.
///
/// Keys may also come from the environment (`GEMINI_API_KEY`,
/// `GEMINI_MODERATOR_API_KEY`); file values win. The moderator key falls
/// back to the participant key so a single-key setup still runs, it just
/// shares one quota lane between both identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub moderator_api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            moderator_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ModelConfig {
    pub fn participant_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }

    pub fn moderator_key(&self) -> Option<String> {
        self.moderator_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_MODERATOR_API_KEY").ok())
            .or_else(|| self.participant_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_production_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_turns, 20);
        assert_eq!(config.limits.requests_per_minute, 15);
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!(config.model.api_key.is_none());
    }

    #[test]
    fn sections_can_be_filled_partially() {
        let config: FileConfig = toml::from_str(
            r#"
            [model]
            api_key = "k-participant"
            model = "gemini-2.5-pro"

            [engine]
            max_turns = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.model.model, "gemini-2.5-pro");
        assert_eq!(config.engine.max_turns, 30);
        assert_eq!(config.limits.requests_per_minute, 15);
    }

    #[test]
    fn moderator_key_falls_back_to_participant_key() {
        let model = ModelConfig {
            api_key: Some("k-shared".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(model.moderator_key().as_deref(), Some("k-shared"));

        let split = ModelConfig {
            api_key: Some("k-participant".to_string()),
            moderator_api_key: Some("k-moderator".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(split.moderator_key().as_deref(), Some("k-moderator"));
        assert_eq!(split.participant_key().as_deref(), Some("k-participant"));
    }
}
