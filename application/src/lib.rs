//! Application layer for roundtable
//!
//! Orchestrates meetings: ports (traits the infrastructure implements),
//! the model gateway with its rate limiters and retry policy, the persona
//! queue, the turn engine, and the lifecycle driver. No I/O lives here; it
//! arrives through the ports.

pub mod config;
pub mod gateway;
pub mod persona_queue;
pub mod ports;
pub mod rate_limit;
pub mod retry;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{EngineParams, OrchestratorConfig};
pub use gateway::{
    ConclusionDecision, GatewayError, GatewayStatus, ModelGateway, ModeratorDecision,
    SynthesizedPersona,
};
pub use persona_queue::{ensure_persona, PersonaError, PersonaQueue, PersonaTicket};
pub use rate_limit::{ConsumerIdentity, LimiterStatus, RateLimitError, RateLimiter, RateLimits};
pub use retry::{with_retry, RetryPolicy};
pub use use_cases::{
    EngineError, LifecycleDriver, MeetingService, ReportService, SubmissionOutcome, TurnEngine,
    TurnOutcome,
};
