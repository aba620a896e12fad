//! Persistence port
//!
//! The core treats storage as a collaborator: whole-row create/read/update
//! per entity, plus "all turns for meeting X, oldest first". Adapters live
//! in the infrastructure layer; a relational store would implement exactly
//! this trait.

use async_trait::async_trait;
use roundtable_domain::{
    ConversationTurn, Meeting, MeetingStatus, Participant, ParticipantInput, Persona, Report,
    Whiteboard,
};
use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Participant {0} has already submitted input")]
    DuplicateInput(String),

    #[error("Report already exists for meeting {0}")]
    DuplicateReport(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Durable storage for meetings and their children, keyed by opaque ids.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    // --- meetings ---
    async fn insert_meeting(&self, meeting: Meeting) -> Result<(), StoreError>;
    async fn meeting(&self, meeting_id: &str) -> Result<Meeting, StoreError>;
    /// All meetings currently in the given status.
    async fn meetings_with_status(&self, status: MeetingStatus) -> Result<Vec<Meeting>, StoreError>;
    async fn set_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<(), StoreError>;
    /// Cancel every meeting that is not already cancelled. Returns how many
    /// were changed.
    async fn cancel_all_active(&self) -> Result<usize, StoreError>;
    async fn set_whiteboard(
        &self,
        meeting_id: &str,
        whiteboard: Whiteboard,
    ) -> Result<(), StoreError>;

    // --- participants ---
    async fn insert_participant(&self, participant: Participant) -> Result<(), StoreError>;
    async fn participants(&self, meeting_id: &str) -> Result<Vec<Participant>, StoreError>;
    async fn participant_by_token(&self, token: &str) -> Result<Participant, StoreError>;
    /// Monotonic false -> true; never reverts.
    async fn mark_submitted(&self, participant_id: &str) -> Result<(), StoreError>;

    // --- inputs ---
    /// Fails with [`StoreError::DuplicateInput`] when the participant has
    /// already submitted.
    async fn insert_input(&self, input: ParticipantInput) -> Result<(), StoreError>;
    /// Inputs for a meeting, oldest first.
    async fn inputs(&self, meeting_id: &str) -> Result<Vec<ParticipantInput>, StoreError>;

    // --- personas ---
    async fn insert_persona(&self, persona: Persona) -> Result<(), StoreError>;
    async fn personas(&self, meeting_id: &str) -> Result<Vec<Persona>, StoreError>;
    async fn persona_for_participant(
        &self,
        meeting_id: &str,
        participant_id: &str,
    ) -> Result<Option<Persona>, StoreError>;

    // --- turns ---
    async fn append_turn(&self, turn: ConversationTurn) -> Result<(), StoreError>;
    /// All turns for a meeting, oldest first.
    async fn turns(&self, meeting_id: &str) -> Result<Vec<ConversationTurn>, StoreError>;

    // --- reports ---
    async fn insert_report(&self, report: Report) -> Result<(), StoreError>;
    async fn report(&self, meeting_id: &str) -> Result<Option<Report>, StoreError>;
}
