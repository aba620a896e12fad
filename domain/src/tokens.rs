//! Token estimation
//!
//! Pure helpers converting prompt/response text to approximate token counts
//! for rate limiting and usage tracking. Rule of thumb: ~4 characters per
//! token for English text.

use serde::{Deserialize, Serialize};

/// Rough token estimate for a piece of text.
pub fn estimate_tokens(text: &str) -> u32 {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (normalized.chars().count() as u32).div_ceil(4)
}

/// Estimate for a prompt made of an optional system part and a user part.
pub fn estimate_input_tokens(system: &str, user: &str) -> u32 {
    estimate_tokens(system) + estimate_tokens(user)
}

/// Expected verbosity class of a response, used for fixed output estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputClass {
    Short,
    Medium,
    Long,
    Json,
}

impl OutputClass {
    /// Fixed output-token estimate by verbosity class.
    pub fn estimate(&self) -> u32 {
        match self {
            OutputClass::Short => 200,
            OutputClass::Medium => 400,
            OutputClass::Long => 800,
            OutputClass::Json => 600,
        }
    }

    /// Output cap passed to the provider, slightly above the estimate to
    /// avoid truncation.
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            OutputClass::Short => 300,
            OutputClass::Medium => 500,
            OutputClass::Long => 1000,
            OutputClass::Json => 800,
        }
    }
}

/// Provider-reported token usage for a completed call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}
