//! In-memory meeting store
//!
//! Hashmap-backed [`MeetingStore`] used by the CLI and by single-process
//! deployments. Everything lives behind one mutex; reads clone rows out so
//! callers never hold the lock across an await point.

use async_trait::async_trait;
use roundtable_application::ports::store::{MeetingStore, StoreError};
use roundtable_domain::{
    ConversationTurn, Meeting, MeetingStatus, Participant, ParticipantInput, Persona, Report,
    Whiteboard,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    meetings: HashMap<String, Meeting>,
    participants: HashMap<String, Participant>,
    inputs: HashMap<String, ParticipantInput>,
    personas: Vec<Persona>,
    turns: Vec<ConversationTurn>,
    reports: HashMap<String, Report>,
}

/// Process-local [`MeetingStore`].
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another thread panicked mid-write;
        // the tables themselves are always left in a consistent state.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MeetingStore for InMemoryStore {
    async fn insert_meeting(&self, meeting: Meeting) -> Result<(), StoreError> {
        self.lock().meetings.insert(meeting.id.clone(), meeting);
        Ok(())
    }

    async fn meeting(&self, meeting_id: &str) -> Result<Meeting, StoreError> {
        self.lock()
            .meetings
            .get(meeting_id)
            .cloned()
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))
    }

    async fn meetings_with_status(
        &self,
        status: MeetingStatus,
    ) -> Result<Vec<Meeting>, StoreError> {
        let mut meetings: Vec<Meeting> = self
            .lock()
            .meetings
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        meetings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(meetings)
    }

    async fn set_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let meeting = tables
            .meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting.status = status;
        Ok(())
    }

    async fn cancel_all_active(&self) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        let mut changed = 0;
        for meeting in tables.meetings.values_mut() {
            if !meeting.status.is_terminal() {
                meeting.status = MeetingStatus::Cancelled;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn set_whiteboard(
        &self,
        meeting_id: &str,
        whiteboard: Whiteboard,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let meeting = tables
            .meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting.whiteboard = whiteboard;
        Ok(())
    }

    async fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.lock()
            .participants
            .insert(participant.id.clone(), participant);
        Ok(())
    }

    async fn participants(&self, meeting_id: &str) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> = self
            .lock()
            .participants
            .values()
            .filter(|p| p.meeting_id == meeting_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(participants)
    }

    async fn participant_by_token(&self, token: &str) -> Result<Participant, StoreError> {
        self.lock()
            .participants
            .values()
            .find(|p| p.token == token)
            .cloned()
            .ok_or_else(|| StoreError::ParticipantNotFound(format!("token {token}")))
    }

    async fn mark_submitted(&self, participant_id: &str) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let participant = tables
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| StoreError::ParticipantNotFound(participant_id.to_string()))?;
        participant.has_submitted = true;
        Ok(())
    }

    async fn insert_input(&self, input: ParticipantInput) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.inputs.contains_key(&input.participant_id) {
            return Err(StoreError::DuplicateInput(input.participant_id.clone()));
        }
        tables.inputs.insert(input.participant_id.clone(), input);
        Ok(())
    }

    async fn inputs(&self, meeting_id: &str) -> Result<Vec<ParticipantInput>, StoreError> {
        let tables = self.lock();
        let mut inputs: Vec<ParticipantInput> = tables
            .inputs
            .values()
            .filter(|i| {
                tables
                    .participants
                    .get(&i.participant_id)
                    .map(|p| p.meeting_id == meeting_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        inputs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(inputs)
    }

    async fn insert_persona(&self, persona: Persona) -> Result<(), StoreError> {
        self.lock().personas.push(persona);
        Ok(())
    }

    async fn personas(&self, meeting_id: &str) -> Result<Vec<Persona>, StoreError> {
        Ok(self
            .lock()
            .personas
            .iter()
            .filter(|p| p.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn persona_for_participant(
        &self,
        meeting_id: &str,
        participant_id: &str,
    ) -> Result<Option<Persona>, StoreError> {
        Ok(self
            .lock()
            .personas
            .iter()
            .find(|p| {
                p.meeting_id == meeting_id && p.participant_id.as_deref() == Some(participant_id)
            })
            .cloned())
    }

    async fn append_turn(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        self.lock().turns.push(turn);
        Ok(())
    }

    async fn turns(&self, meeting_id: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(self
            .lock()
            .turns
            .iter()
            .filter(|t| t.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn insert_report(&self, report: Report) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.reports.contains_key(&report.meeting_id) {
            return Err(StoreError::DuplicateReport(report.meeting_id.clone()));
        }
        tables.reports.insert(report.meeting_id.clone(), report);
        Ok(())
    }

    async fn report(&self, meeting_id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self.lock().reports.get(meeting_id).cloned())
    }
}
