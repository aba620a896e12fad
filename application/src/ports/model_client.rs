//! Generative model port
//!
//! Defines the boundary to the external generative model. Implementations
//! (adapters) live in the infrastructure layer; the application layer only
//! sees requests, replies, finish reasons, and a classified error type.

use async_trait::async_trait;
use roundtable_domain::TokenUsage;
use std::time::Duration;
use thiserror::Error;

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Blocked by the safety filter; fatal for this call.
    Safety,
    /// Blocked by the recitation filter; fatal for this call.
    Recitation,
    /// Hit the output-token cap; the text may be truncated but is usable.
    MaxTokens,
    /// Provider-specific reason.
    Other(String),
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Ask the provider to force a JSON response body.
    pub json_mode: bool,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_output_tokens: 4000,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

/// Errors crossing the model boundary, classified for the retry policy.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Rate limited by provider{}", match .retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    })]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response blocked by {filter} filter")]
    ContentBlocked { filter: String },

    #[error("Empty or incomplete response from provider")]
    EmptyResponse,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ModelError {
    /// Whether the retry policy may attempt this call again.
    ///
    /// Quota and transient transport failures are retryable; content-policy
    /// blocks, malformed requests, and auth failures are not. Empty
    /// responses are treated as transient generation glitches.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RateLimited { .. }
            | ModelError::ServerError { .. }
            | ModelError::Network(_)
            | ModelError::EmptyResponse => true,
            ModelError::ContentBlocked { .. }
            | ModelError::InvalidRequest(_)
            | ModelError::Auth(_) => false,
        }
    }

    /// Provider-supplied retry hint, either structured or parsed from a
    /// textual "retry after N seconds" pattern in the message.
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            ModelError::RateLimited {
                retry_after: Some(delay),
            } => Some(*delay),
            ModelError::ServerError { message, .. } => parse_retry_after_text(message),
            ModelError::RateLimited { retry_after: None } => None,
            _ => None,
        }
    }
}

/// Parse "retry after N seconds" out of a free-text error message.
fn parse_retry_after_text(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    let idx = lower.find("retry after ")?;
    let rest = &lower[idx + "retry after ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let tail = &rest[digits.len()..];
    if !tail.trim_start().starts_with("second") {
        return None;
    }
    digits.parse::<u64>().ok().map(Duration::from_secs)
}

/// Port to the external generative model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one generation request to completion.
    async fn generate(&self, request: ModelRequest) -> Result<ModelReply, ModelError>;
}
