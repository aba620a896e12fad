//! Domain error types

use thiserror::Error;

use crate::meeting::entities::MeetingStatus;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MeetingStatus,
        to: MeetingStatus,
    },

    #[error("Moderator persona missing for meeting {0}")]
    ModeratorMissing(String),

    #[error("Unknown speaker selected: {0}")]
    UnknownSpeaker(String),

    #[error("Participant has already submitted input")]
    AlreadySubmitted,

    #[error("Invalid speaker tag: {0}")]
    InvalidSpeakerTag(String),
}
