//! Use cases: the operations the outside world invokes
//!
//! Each use case composes the ports with the gateway and the domain rules.
//! Construction is plain dependency injection; the binary wires adapters in.

pub mod driver;
pub mod meetings;
pub mod report;
pub mod turn;

use roundtable_domain::{DomainError, MeetingStatus};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::persona_queue::PersonaError;
use crate::ports::store::StoreError;

/// Errors surfaced by the orchestration layer.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Persona(#[from] PersonaError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("moderator selected unknown speaker: {0}")]
    UnknownSpeaker(String),

    #[error("inputs are closed, meeting is {status}")]
    InputsClosed { status: MeetingStatus },

    #[error("meeting is {status}, report requires a concluded meeting")]
    MeetingNotConcluded { status: MeetingStatus },
}

pub use driver::LifecycleDriver;
pub use meetings::{MeetingService, SubmissionOutcome};
pub use report::ReportService;
pub use turn::{TurnEngine, TurnOutcome};
