//! Meeting lifecycle use cases
//!
//! Creation, input collection, and the manual lifecycle commands. The
//! deployment runs a single active meeting: creating a new one cancels
//! whatever was in flight.

use std::sync::Arc;
use tracing::{info, warn};

use roundtable_domain::{
    ConversationTurn, DomainError, Mcp, Meeting, MeetingStatus, Participant, ParticipantInput,
    Persona, PersonaRole, Speaker,
};

use crate::persona_queue::PersonaQueue;
use crate::ports::broadcast::{EventBroadcaster, MeetingEvent};
use crate::ports::notifier::InviteNotifier;
use crate::ports::store::MeetingStore;
use crate::use_cases::EngineError;

/// Result of recording a participant's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Recorded; other participants are still pending.
    Recorded { pending: usize },
    /// Recorded, and this was the last one: the meeting is now running.
    MeetingStarted,
}

pub struct MeetingService {
    store: Arc<dyn MeetingStore>,
    notifier: Arc<dyn InviteNotifier>,
    events: Arc<dyn EventBroadcaster>,
    personas: PersonaQueue,
}

impl MeetingService {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        notifier: Arc<dyn InviteNotifier>,
        events: Arc<dyn EventBroadcaster>,
        personas: PersonaQueue,
    ) -> Self {
        Self {
            store,
            notifier,
            events,
            personas,
        }
    }

    /// Create a meeting and invite its participants.
    ///
    /// Invitations are fire-and-forget; a delivery failure is logged and the
    /// meeting proceeds (the token can be shared out of band).
    pub async fn create_meeting(
        &self,
        subject: &str,
        details: &str,
        contacts: &[String],
    ) -> Result<(Meeting, Vec<Participant>), EngineError> {
        let cancelled = self.store.cancel_all_active().await?;
        if cancelled > 0 {
            info!(cancelled, "cancelled prior meetings for new meeting");
        }

        let meeting = Meeting::new(uuid::Uuid::new_v4().to_string(), subject, details);
        self.store.insert_meeting(meeting.clone()).await?;

        let mut participants = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let participant = Participant {
                id: uuid::Uuid::new_v4().to_string(),
                meeting_id: meeting.id.clone(),
                contact: contact.clone(),
                token: uuid::Uuid::new_v4().to_string(),
                has_submitted: false,
                created_at: chrono::Utc::now(),
            };
            self.store.insert_participant(participant.clone()).await?;
            if let Err(reason) = self.notifier.send_invite(&participant, subject).await {
                warn!(contact = %participant.contact, reason, "invite delivery failed");
            }
            participants.push(participant);
        }
        info!(meeting_id = %meeting.id, participants = participants.len(), "meeting created");
        Ok((meeting, participants))
    }

    /// Record a participant's one-time input, identified by their token.
    ///
    /// When the last pending participant submits, the meeting transitions to
    /// Running, the moderator persona is seeded, and persona synthesis for
    /// every submitted input is queued.
    pub async fn submit_input(
        &self,
        token: &str,
        content: &str,
    ) -> Result<SubmissionOutcome, EngineError> {
        let participant = self.store.participant_by_token(token).await?;
        let meeting = self.store.meeting(&participant.meeting_id).await?;
        if meeting.status != MeetingStatus::AwaitingInputs {
            return Err(EngineError::InputsClosed {
                status: meeting.status,
            });
        }
        if participant.has_submitted {
            return Err(DomainError::AlreadySubmitted.into());
        }

        self.store
            .insert_input(ParticipantInput {
                id: uuid::Uuid::new_v4().to_string(),
                participant_id: participant.id.clone(),
                content: content.to_string(),
                created_at: chrono::Utc::now(),
            })
            .await?;
        self.store.mark_submitted(&participant.id).await?;
        // Eager synthesis; the ticket is dropped since the turn engine can
        // also create the persona on demand.
        drop(self.personas.submit(&meeting.id, &participant.id));
        info!(meeting_id = %meeting.id, contact = %participant.contact, "input recorded");

        let participants = self.store.participants(&meeting.id).await?;
        let pending = participants.iter().filter(|p| !p.has_submitted).count();
        if pending > 0 {
            return Ok(SubmissionOutcome::Recorded { pending });
        }

        self.seed_moderator(&meeting.id).await?;
        self.store
            .set_status(&meeting.id, MeetingStatus::Running)
            .await?;
        self.events.publish(MeetingEvent::StatusChanged {
            meeting_id: meeting.id.clone(),
            status: MeetingStatus::Running,
        });
        info!(meeting_id = %meeting.id, "all inputs in, meeting started");
        Ok(SubmissionOutcome::MeetingStarted)
    }

    pub async fn pause(&self, meeting_id: &str) -> Result<(), EngineError> {
        self.transition(meeting_id, MeetingStatus::Paused).await
    }

    pub async fn resume(&self, meeting_id: &str) -> Result<(), EngineError> {
        self.transition(meeting_id, MeetingStatus::Running).await
    }

    pub async fn cancel(&self, meeting_id: &str) -> Result<(), EngineError> {
        self.transition(meeting_id, MeetingStatus::Cancelled).await
    }

    /// Append a message from a human observer into the transcript.
    ///
    /// Injecting into a Paused meeting resumes it: human input is the
    /// designated way out of a detected deadlock.
    pub async fn inject_human_message(
        &self,
        meeting_id: &str,
        author: &str,
        message: &str,
    ) -> Result<(), EngineError> {
        let meeting = self.store.meeting(meeting_id).await?;
        if !matches!(
            meeting.status,
            MeetingStatus::Running | MeetingStatus::Paused
        ) {
            return Err(DomainError::InvalidTransition {
                from: meeting.status,
                to: MeetingStatus::Running,
            }
            .into());
        }

        let turn = ConversationTurn {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id: meeting_id.to_string(),
            speaker: Speaker::Human(author.to_string()),
            message: message.to_string(),
            created_at: chrono::Utc::now(),
            metadata: None,
        };
        self.store.append_turn(turn.clone()).await?;
        self.events.publish(MeetingEvent::TurnAppended {
            meeting_id: meeting_id.to_string(),
            turn,
        });

        if meeting.status == MeetingStatus::Paused {
            self.transition(meeting_id, MeetingStatus::Running).await?;
            info!(meeting_id, author, "human message resumed a paused meeting");
        }
        Ok(())
    }

    async fn transition(&self, meeting_id: &str, to: MeetingStatus) -> Result<(), EngineError> {
        let meeting = self.store.meeting(meeting_id).await?;
        if !meeting.status.can_transition(to) {
            return Err(DomainError::InvalidTransition {
                from: meeting.status,
                to,
            }
            .into());
        }
        self.store.set_status(meeting_id, to).await?;
        self.events.publish(MeetingEvent::StatusChanged {
            meeting_id: meeting_id.to_string(),
            status: to,
        });
        info!(meeting_id, from = %meeting.status, to = %to, "meeting status changed");
        Ok(())
    }

    async fn seed_moderator(&self, meeting_id: &str) -> Result<(), EngineError> {
        let personas = self.store.personas(meeting_id).await?;
        if personas.iter().any(|p| p.is_moderator()) {
            return Ok(());
        }
        self.store
            .insert_persona(Persona {
                id: uuid::Uuid::new_v4().to_string(),
                meeting_id: meeting_id.to_string(),
                participant_id: None,
                role: PersonaRole::Moderator,
                name: "Moderator".to_string(),
                mcp: Mcp::moderator(),
                created_at: chrono::Utc::now(),
            })
            .await?;
        Ok(())
    }
}
