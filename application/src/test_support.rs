//! Shared fixtures for this crate's tests: a hashmap-backed store and
//! entity builders.

use async_trait::async_trait;
use chrono::Utc;
use roundtable_domain::{
    ConversationTurn, Meeting, MeetingStatus, Participant, ParticipantInput, Persona, PersonaRole,
    Report, Speaker, Whiteboard,
};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ports::store::{MeetingStore, StoreError};

#[derive(Default)]
struct Tables {
    meetings: HashMap<String, Meeting>,
    participants: HashMap<String, Participant>,
    inputs: HashMap<String, ParticipantInput>,
    personas: Vec<Persona>,
    turns: Vec<ConversationTurn>,
    reports: HashMap<String, Report>,
}

/// In-memory [`MeetingStore`] for tests.
#[derive(Default)]
pub struct TestStore {
    tables: Mutex<Tables>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MeetingStore for TestStore {
    async fn insert_meeting(&self, meeting: Meeting) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .meetings
            .insert(meeting.id.clone(), meeting);
        Ok(())
    }

    async fn meeting(&self, meeting_id: &str) -> Result<Meeting, StoreError> {
        self.tables
            .lock()
            .unwrap()
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
            .tables
            .lock()
            .unwrap()
            .meetings
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        meetings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(meetings)
    }

    async fn set_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let meeting = tables
            .meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting.status = status;
        Ok(())
    }

    async fn cancel_all_active(&self) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().unwrap();
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
        let mut tables = self.tables.lock().unwrap();
        let meeting = tables
            .meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting.whiteboard = whiteboard;
        Ok(())
    }

    async fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .participants
            .insert(participant.id.clone(), participant);
        Ok(())
    }

    async fn participants(&self, meeting_id: &str) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> = self
            .tables
            .lock()
            .unwrap()
            .participants
            .values()
            .filter(|p| p.meeting_id == meeting_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(participants)
    }

    async fn participant_by_token(&self, token: &str) -> Result<Participant, StoreError> {
        self.tables
            .lock()
            .unwrap()
            .participants
            .values()
            .find(|p| p.token == token)
            .cloned()
            .ok_or_else(|| StoreError::ParticipantNotFound(format!("token {token}")))
    }

    async fn mark_submitted(&self, participant_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let participant = tables
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| StoreError::ParticipantNotFound(participant_id.to_string()))?;
        participant.has_submitted = true;
        Ok(())
    }

    async fn insert_input(&self, input: ParticipantInput) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.inputs.contains_key(&input.participant_id) {
            return Err(StoreError::DuplicateInput(input.participant_id.clone()));
        }
        tables.inputs.insert(input.participant_id.clone(), input);
        Ok(())
    }

    async fn inputs(&self, meeting_id: &str) -> Result<Vec<ParticipantInput>, StoreError> {
        let tables = self.tables.lock().unwrap();
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
        inputs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(inputs)
    }

    async fn insert_persona(&self, persona: Persona) -> Result<(), StoreError> {
        self.tables.lock().unwrap().personas.push(persona);
        Ok(())
    }

    async fn personas(&self, meeting_id: &str) -> Result<Vec<Persona>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
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
            .tables
            .lock()
            .unwrap()
            .personas
            .iter()
            .find(|p| {
                p.meeting_id == meeting_id && p.participant_id.as_deref() == Some(participant_id)
            })
            .cloned())
    }

    async fn append_turn(&self, turn: ConversationTurn) -> Result<(), StoreError> {
        self.tables.lock().unwrap().turns.push(turn);
        Ok(())
    }

    async fn turns(&self, meeting_id: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .turns
            .iter()
            .filter(|t| t.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn insert_report(&self, report: Report) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.reports.contains_key(&report.meeting_id) {
            return Err(StoreError::DuplicateReport(report.meeting_id.clone()));
        }
        tables.reports.insert(report.meeting_id.clone(), report);
        Ok(())
    }

    async fn report(&self, meeting_id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .reports
            .get(meeting_id)
            .cloned())
    }
}

pub fn meeting(id: &str, status: MeetingStatus) -> Meeting {
    Meeting {
        id: id.to_string(),
        subject: "Q3 planning".to_string(),
        details: "Decide scope for the next release".to_string(),
        status,
        whiteboard: Whiteboard::default(),
        created_at: Utc::now(),
    }
}

pub fn participant(id: &str, meeting_id: &str, contact: &str) -> Participant {
    Participant {
        id: id.to_string(),
        meeting_id: meeting_id.to_string(),
        contact: contact.to_string(),
        token: format!("token-{id}"),
        has_submitted: false,
        created_at: Utc::now(),
    }
}

pub fn input(participant_id: &str, content: &str) -> ParticipantInput {
    ParticipantInput {
        id: format!("in-{participant_id}"),
        participant_id: participant_id.to_string(),
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

pub fn persona(meeting_id: &str, participant_id: &str, name: &str) -> Persona {
    Persona {
        id: format!("per-{participant_id}"),
        meeting_id: meeting_id.to_string(),
        participant_id: Some(participant_id.to_string()),
        role: PersonaRole::Participant,
        name: name.to_string(),
        mcp: roundtable_domain::Mcp {
            identity: format!("{name}, a focused contributor"),
            objectives: vec!["Reach a decision".to_string()],
            rules: vec![roundtable_domain::Mcp::DIRECTNESS_RULE.to_string()],
            output_format: "Concise".to_string(),
            tools: vec![],
        },
        created_at: Utc::now(),
    }
}

pub fn turn(meeting_id: &str, speaker: Speaker, message: &str) -> ConversationTurn {
    ConversationTurn {
        id: uuid::Uuid::new_v4().to_string(),
        meeting_id: meeting_id.to_string(),
        speaker,
        message: message.to_string(),
        created_at: Utc::now(),
        metadata: None,
    }
}
