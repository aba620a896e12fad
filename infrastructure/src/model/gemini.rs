//! Gemini model client
//!
//! [`ModelClient`] adapter for the Gemini `generateContent` REST endpoint.
//! Maps HTTP and provider-level failures onto the classified error type the
//! retry policy understands, including the structured `RetryInfo` hint that
//! quota responses carry.

use async_trait::async_trait;
use roundtable_application::ports::model_client::{
    FinishReason, ModelClient, ModelError, ModelReply, ModelRequest,
};
use roundtable_domain::TokenUsage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for one client identity.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// HTTP client for one Gemini identity. The orchestrator holds two of
/// these (moderator and participant) so each key gets its own quota lane.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelReply, ModelError> {
        let body = WireRequest::from_request(&request);
        debug!(model = %self.config.model, json_mode = request.json_mode, "calling gemini");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &text));
        }

        let wire: WireResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::Network(format!("unreadable response body: {e}")))?;
        interpret_response(wire)
    }
}

/// Map a non-2xx status plus its body onto [`ModelError`].
fn classify_failure(status: u16, body: &str) -> ModelError {
    let parsed: Option<WireError> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| truncate(body, 300));

    match status {
        429 => ModelError::RateLimited {
            retry_after: parsed.as_ref().and_then(WireError::retry_delay),
        },
        401 | 403 => ModelError::Auth(message),
        400..=499 => ModelError::InvalidRequest(message),
        _ => ModelError::ServerError { status, message },
    }
}

/// Turn a decoded success body into a reply, surfacing provider-side
/// blocks and empty candidate lists as errors.
fn interpret_response(wire: WireResponse) -> Result<ModelReply, ModelError> {
    if let Some(reason) = wire.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelError::ContentBlocked { filter: reason });
    }

    let candidate = wire
        .candidates
        .into_iter()
        .flatten()
        .next()
        .ok_or(ModelError::EmptyResponse)?;

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .flatten()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(ModelReply {
        text,
        finish_reason: map_finish_reason(candidate.finish_reason.as_deref()),
        usage: wire.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }),
    })
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        None | Some("STOP") => FinishReason::Stop,
        Some("SAFETY") => FinishReason::Safety,
        Some("RECITATION") => FinishReason::Recitation,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

// --- wire format ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireInstruction>,
    generation_config: WireGenerationConfig,
}

impl WireRequest {
    fn from_request(request: &ModelRequest) -> Self {
        Self {
            contents: vec![WireContent {
                role: Some("user".to_string()),
                parts: Some(vec![WirePart {
                    text: Some(request.prompt.clone()),
                }]),
            }],
            system_instruction: request.system.as_ref().map(|s| WireInstruction {
                parts: vec![WirePart {
                    text: Some(s.clone()),
                }],
            }),
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request
                    .json_mode
                    .then(|| "application/json".to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct WireInstruction {
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parts: Option<Vec<WirePart>>,
}

#[derive(Serialize, Deserialize)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    candidates: Option<Vec<WireCandidate>>,
    usage_metadata: Option<WireUsage>,
    prompt_feedback: Option<WireFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireUsage {
    prompt_token_count: u32,
    candidates_token_count: u32,
    total_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireErrorBody {
    message: String,
    details: Vec<serde_json::Value>,
}

impl WireError {
    /// Extract the `RetryInfo.retryDelay` hint ("12s", "1.5s") from the
    /// error detail list, when present.
    fn retry_delay(&self) -> Option<Duration> {
        self.error.details.iter().find_map(|detail| {
            let is_retry_info = detail
                .get("@type")
                .and_then(|t| t.as_str())
                .map(|t| t.ends_with("RetryInfo"))
                .unwrap_or(false);
            if !is_retry_info {
                return None;
            }
            let delay = detail.get("retryDelay")?.as_str()?;
            let seconds: f64 = delay.trim_end_matches('s').parse().ok()?;
            Some(Duration::from_secs_f64(seconds))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_system_and_json_mode() {
        let request = ModelRequest::new("list three risks")
            .with_system("You are the moderator")
            .with_temperature(0.5)
            .json();
        let body = serde_json::to_value(WireRequest::from_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "list three risks");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are the moderator"
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4000);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn plain_text_request_omits_mime_type() {
        let request = ModelRequest::new("say hello");
        let body = serde_json::to_value(WireRequest::from_request(&request)).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn success_body_maps_text_and_usage() {
        let wire: WireResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "Hello "}, {"text": "there"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 5,
                    "totalTokenCount": 17
                }
            }"#,
        )
        .unwrap();

        let reply = interpret_response(wire).unwrap();
        assert_eq!(reply.text, "Hello there");
        assert_eq!(reply.finish_reason, FinishReason::Stop);
        let usage = reply.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.total_tokens, 17);
    }

    #[test]
    fn blocked_prompt_is_a_content_block() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"promptFeedback": {"blockReason": "SAFETY"}, "candidates": []}"#,
        )
        .unwrap();
        assert!(matches!(
            interpret_response(wire),
            Err(ModelError::ContentBlocked { filter }) if filter == "SAFETY"
        ));
    }

    #[test]
    fn empty_candidate_list_is_an_empty_response() {
        let wire: WireResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            interpret_response(wire),
            Err(ModelError::EmptyResponse)
        ));
    }

    #[test]
    fn finish_reasons_map_onto_the_port_enum() {
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), FinishReason::MaxTokens);
        assert_eq!(map_finish_reason(Some("RECITATION")), FinishReason::Recitation);
        assert_eq!(map_finish_reason(None), FinishReason::Stop);
        assert_eq!(
            map_finish_reason(Some("OTHER")),
            FinishReason::Other("OTHER".to_string())
        );
    }

    #[test]
    fn quota_failure_carries_the_retry_hint() {
        let body = r#"{
            "error": {
                "code": 429,
                "message": "Resource has been exhausted",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                    {
                        "@type": "type.googleapis.com/google.rpc.RetryInfo",
                        "retryDelay": "14s"
                    }
                ]
            }
        }"#;
        match classify_failure(429, body) {
            ModelError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(14)));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn auth_and_bad_request_statuses_are_fatal_classes() {
        assert!(matches!(
            classify_failure(403, r#"{"error": {"message": "key revoked"}}"#),
            ModelError::Auth(m) if m == "key revoked"
        ));
        assert!(matches!(
            classify_failure(400, "not json at all"),
            ModelError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_failure(503, r#"{"error": {"message": "overloaded"}}"#),
            ModelError::ServerError { status: 503, .. }
        ));
    }
}
