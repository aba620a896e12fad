//! Model gateway
//!
//! The single place the application talks to the generative model. Owns one
//! rate limiter per consumer identity and the retry policy, builds prompts
//! from the domain templates, and decodes replies into typed results. Every
//! operation carries a priority; lower values jump the queue.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use roundtable_domain::{
    decode_json, estimate_input_tokens, ConversationTurn, Mcp, MeetingSummary, OutputClass,
    ParseFailure, Persona, Whiteboard, WhiteboardUpdate,
};
use roundtable_domain::{MeetingPrompts, SpeakerOption};

use crate::ports::model_client::{FinishReason, ModelClient, ModelError, ModelReply, ModelRequest};
use crate::rate_limit::{ConsumerIdentity, LimiterStatus, RateLimitError, RateLimiter, RateLimits};
use crate::retry::{with_retry, RetryPolicy};

/// Queue priorities per operation. Lower runs first.
mod priority {
    pub const SUMMARIZE: u8 = 0;
    pub const PERSONA_SYNTHESIS: u8 = 1;
    pub const NEXT_SPEAKER: u8 = 2;
    pub const PERSONA_RESPONSE: u8 = 2;
    pub const CONCLUSION: u8 = 3;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Scheduling(#[from] RateLimitError),

    #[error("{operation} reply could not be parsed: {source}")]
    Parse {
        operation: &'static str,
        source: ParseFailure,
    },

    #[error("synthesized persona is incomplete: {0}")]
    IncompletePersona(String),
}

/// A persona as returned by the synthesis operation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SynthesizedPersona {
    pub name: String,
    pub mcp: Mcp,
}

/// The moderator's turn decision.
#[derive(Debug, Clone)]
pub struct ModeratorDecision {
    /// Contact of the chosen participant, `None` when the moderator said
    /// "none".
    pub next_speaker: Option<String>,
    pub moderator_notes: String,
    pub whiteboard_update: Option<WhiteboardUpdate>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionWire {
    next_speaker: String,
    #[serde(default)]
    moderator_notes: String,
    #[serde(default)]
    whiteboard_update: Option<WhiteboardUpdate>,
}

/// Result of the conclusion check.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConclusionDecision {
    pub conclude: bool,
    #[serde(default)]
    pub reason: String,
}

/// Combined limiter snapshot for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct GatewayStatus {
    pub moderator: LimiterStatus,
    pub participant: LimiterStatus,
}

pub struct ModelGateway {
    moderator_client: Arc<dyn ModelClient>,
    participant_client: Arc<dyn ModelClient>,
    moderator: RateLimiter,
    participant: RateLimiter,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn ModelClient>, limits: RateLimits, retry: RetryPolicy) -> Self {
        Self::with_clients(Arc::clone(&client), client, limits, retry)
    }

    /// Build a gateway whose identities use distinct clients, so each can
    /// authenticate with its own credentials and quota.
    pub fn with_clients(
        moderator_client: Arc<dyn ModelClient>,
        participant_client: Arc<dyn ModelClient>,
        limits: RateLimits,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            moderator_client,
            participant_client,
            moderator: RateLimiter::new(ConsumerIdentity::Moderator, limits),
            participant: RateLimiter::new(ConsumerIdentity::Participant, limits),
            retry,
        }
    }

    /// Derive a persona from a participant's raw input.
    ///
    /// The reply must carry a name and a complete profile; anything less is
    /// rejected outright rather than patched up, except the fixed first rule
    /// which is inserted when the model forgot it.
    pub async fn synthesize_persona(
        &self,
        input: &str,
        subject: &str,
        display_name: Option<&str>,
    ) -> Result<SynthesizedPersona, GatewayError> {
        let request = ModelRequest::new(MeetingPrompts::persona_synthesis(
            input,
            subject,
            display_name,
        ))
        .with_system(MeetingPrompts::persona_system())
        .with_temperature(0.7)
        .json();
        let reply = self
            .call(
                ConsumerIdentity::Participant,
                priority::PERSONA_SYNTHESIS,
                OutputClass::Json,
                "persona_synthesis",
                request,
            )
            .await?;

        let mut persona: SynthesizedPersona =
            decode_json(&reply.text).map_err(|source| GatewayError::Parse {
                operation: "persona_synthesis",
                source,
            })?;
        if persona.name.trim().is_empty() {
            return Err(GatewayError::IncompletePersona("missing name".to_string()));
        }
        if persona.mcp.identity.trim().is_empty() {
            return Err(GatewayError::IncompletePersona(
                "missing identity".to_string(),
            ));
        }
        if persona.mcp.objectives.is_empty() {
            return Err(GatewayError::IncompletePersona(
                "missing objectives".to_string(),
            ));
        }
        if persona.mcp.rules.is_empty() {
            return Err(GatewayError::IncompletePersona("missing rules".to_string()));
        }
        if persona.mcp.output_format.trim().is_empty() {
            return Err(GatewayError::IncompletePersona(
                "missing output format".to_string(),
            ));
        }
        if persona.mcp.rules.first().map(String::as_str) != Some(Mcp::DIRECTNESS_RULE) {
            persona
                .mcp
                .rules
                .insert(0, Mcp::DIRECTNESS_RULE.to_string());
        }
        info!(name = %persona.name, "synthesized persona");
        Ok(persona)
    }

    /// Ask the moderator who speaks next. `turns` is the full transcript;
    /// only the trailing window is sent.
    pub async fn decide_next_speaker(
        &self,
        moderator: &Mcp,
        whiteboard: &Whiteboard,
        turns: &[ConversationTurn],
        roster: &[SpeakerOption],
    ) -> Result<ModeratorDecision, GatewayError> {
        let recent = trailing(turns, 5);
        let request = ModelRequest::new(MeetingPrompts::next_speaker(
            moderator, whiteboard, recent, roster,
        ))
        .with_temperature(0.8)
        .json();
        let reply = self
            .call(
                ConsumerIdentity::Moderator,
                priority::NEXT_SPEAKER,
                OutputClass::Json,
                "next_speaker",
                request,
            )
            .await?;

        let wire: DecisionWire = decode_json(&reply.text).map_err(|source| GatewayError::Parse {
            operation: "next_speaker",
            source,
        })?;
        let next_speaker = if wire.next_speaker.trim().eq_ignore_ascii_case("none") {
            None
        } else {
            Some(wire.next_speaker.trim().to_string())
        };
        Ok(ModeratorDecision {
            next_speaker,
            moderator_notes: wire.moderator_notes,
            whiteboard_update: wire.whiteboard_update.filter(|u| !u.is_empty()),
        })
    }

    /// Produce a persona's next contribution as plain text.
    pub async fn persona_respond(
        &self,
        persona: &Persona,
        participant_input: Option<&str>,
        turns: &[ConversationTurn],
    ) -> Result<String, GatewayError> {
        let recent = trailing(turns, 8);
        let request = ModelRequest::new(MeetingPrompts::persona_response(
            &persona.name,
            &persona.mcp,
            participant_input,
            recent,
        ))
        .with_temperature(0.9);
        let reply = self
            .call(
                ConsumerIdentity::Participant,
                priority::PERSONA_RESPONSE,
                OutputClass::Short,
                "persona_response",
                request,
            )
            .await?;
        Ok(reply.text.trim().to_string())
    }

    /// Ask the moderator whether the meeting objectives are met.
    pub async fn check_conclusion(
        &self,
        moderator: &Mcp,
        whiteboard: &Whiteboard,
        turns: &[ConversationTurn],
    ) -> Result<ConclusionDecision, GatewayError> {
        let recent = trailing(turns, 3);
        let request = ModelRequest::new(MeetingPrompts::conclusion(
            moderator,
            whiteboard,
            recent.len(),
        ))
        .with_system(MeetingPrompts::conclusion_system())
        .with_temperature(0.5)
        .json();
        let reply = self
            .call(
                ConsumerIdentity::Moderator,
                priority::CONCLUSION,
                OutputClass::Json,
                "conclusion_check",
                request,
            )
            .await?;
        decode_json(&reply.text).map_err(|source| GatewayError::Parse {
            operation: "conclusion_check",
            source,
        })
    }

    /// Summarize a finished meeting.
    ///
    /// A meeting with no turns gets a canned summary without spending a
    /// model call. A reply that fails to parse degrades to a summary
    /// assembled from the whiteboard rather than failing the report.
    pub async fn summarize(
        &self,
        whiteboard: &Whiteboard,
        turns: &[ConversationTurn],
    ) -> Result<MeetingSummary, GatewayError> {
        if turns.is_empty() {
            return Ok(MeetingSummary::empty_meeting());
        }
        let recent = trailing(turns, 10);
        let request = ModelRequest::new(MeetingPrompts::summary(whiteboard, recent))
            .with_system(MeetingPrompts::summary_system())
            .with_temperature(0.6)
            .json();
        let reply = self
            .call(
                ConsumerIdentity::Moderator,
                priority::SUMMARIZE,
                OutputClass::Long,
                "summarize",
                request,
            )
            .await?;
        match decode_json::<MeetingSummary>(&reply.text) {
            Ok(summary) => Ok(summary),
            Err(failure) => {
                warn!(error = %failure, "summary reply unusable, falling back to whiteboard");
                Ok(MeetingSummary::fallback(whiteboard, recent))
            }
        }
    }

    pub async fn status(&self) -> Result<GatewayStatus, GatewayError> {
        Ok(GatewayStatus {
            moderator: self.moderator.status().await?,
            participant: self.participant.status().await?,
        })
    }

    async fn call(
        &self,
        identity: ConsumerIdentity,
        priority: u8,
        output: OutputClass,
        operation: &'static str,
        mut request: ModelRequest,
    ) -> Result<ModelReply, GatewayError> {
        request.max_output_tokens = output.max_output_tokens();
        let estimated = estimate_input_tokens(
            request.system.as_deref().unwrap_or(""),
            &request.prompt,
        ) + output.estimate();

        let (limiter, client) = match identity {
            ConsumerIdentity::Moderator => (&self.moderator, &self.moderator_client),
            ConsumerIdentity::Participant => (&self.participant, &self.participant_client),
        };
        let client = Arc::clone(client);
        let retry = self.retry;
        let reply = limiter
            .schedule(priority, estimated, move || async move {
                with_retry(operation, &retry, || {
                    let request = request.clone();
                    let client = Arc::clone(&client);
                    async move { client.generate(request).await.and_then(accept_reply) }
                })
                .await
            })
            .await??;

        if let Some(usage) = &reply.usage {
            limiter.reconcile(estimated, usage.total_tokens).await;
        }
        Ok(reply)
    }
}

/// Classify a raw reply: content-policy stops are fatal, truncation is
/// accepted with a warning, and blank text is treated as a transient glitch
/// so the retry policy gets another attempt.
fn accept_reply(reply: ModelReply) -> Result<ModelReply, ModelError> {
    match &reply.finish_reason {
        FinishReason::Safety => Err(ModelError::ContentBlocked {
            filter: "SAFETY".to_string(),
        }),
        FinishReason::Recitation => Err(ModelError::ContentBlocked {
            filter: "RECITATION".to_string(),
        }),
        FinishReason::MaxTokens => {
            warn!("reply truncated at the output token cap, accepting as-is");
            Ok(reply)
        }
        FinishReason::Stop | FinishReason::Other(_) => {
            if reply.text.trim().is_empty() {
                Err(ModelError::EmptyResponse)
            } else {
                Ok(reply)
            }
        }
    }
}

fn trailing(turns: &[ConversationTurn], window: usize) -> &[ConversationTurn] {
    &turns[turns.len().saturating_sub(window)..]
}
