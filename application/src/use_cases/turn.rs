//! The turn engine
//!
//! Drives one conversation turn for a meeting: the moderator picks a
//! speaker, the whiteboard absorbs the moderator's update, the chosen
//! persona responds, and the turn lands in the transcript. Meetings run one
//! turn at a time; a second caller finds the per-meeting lock held and
//! backs off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use roundtable_domain::{
    detect_deadlock, ConversationTurn, DeadlockVerdict, Mcp, Meeting, MeetingStatus, Participant,
    Persona, Speaker, SpeakerOption,
};

use crate::config::EngineParams;
use crate::gateway::ModelGateway;
use crate::persona_queue::ensure_persona;
use crate::ports::broadcast::{EventBroadcaster, MeetingEvent};
use crate::ports::store::MeetingStore;
use crate::use_cases::EngineError;

/// What a single `run_turn` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Another caller holds the meeting's turn lock.
    Busy,
    /// The meeting is not in the Running state.
    NotRunning,
    /// The moderator declined to pick a speaker; try again next cycle.
    Waiting,
    /// The selected persona produced nothing usable; no turn was recorded.
    Skipped { speaker: String },
    /// A turn was appended.
    Spoke { speaker: String },
    /// Deadlock detected; the meeting is now paused.
    Paused { reason: String },
    /// The meeting concluded.
    Concluded { reason: String },
}

pub struct TurnEngine {
    store: Arc<dyn MeetingStore>,
    gateway: Arc<ModelGateway>,
    events: Arc<dyn EventBroadcaster>,
    params: EngineParams,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TurnEngine {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        gateway: Arc<ModelGateway>,
        events: Arc<dyn EventBroadcaster>,
        params: EngineParams,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            params,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Run one turn. Every path re-validates meeting state from the store
    /// first; a meeting paused or cancelled between ticks is left alone.
    pub async fn run_turn(&self, meeting_id: &str) -> Result<TurnOutcome, EngineError> {
        let lock = self.lock_for(meeting_id);
        let Ok(_guard) = lock.try_lock() else {
            return Ok(TurnOutcome::Busy);
        };

        let mut meeting = self.store.meeting(meeting_id).await?;
        if meeting.status != MeetingStatus::Running {
            return Ok(TurnOutcome::NotRunning);
        }

        let turns = self.store.turns(meeting_id).await?;
        if turns.len() >= self.params.max_turns {
            return self
                .conclude(meeting_id, "Maximum turn count reached")
                .await;
        }

        // Deadlock is judged on the existing transcript, before spending any
        // model budget on this turn.
        if let DeadlockVerdict::Deadlocked { reason } =
            detect_deadlock(&turns, &self.params.deadlock)
        {
            return self.pause_deadlocked(meeting_id, reason).await;
        }

        let participants = self.store.participants(meeting_id).await?;
        let personas = self.store.personas(meeting_id).await?;
        let moderator_mcp = personas
            .iter()
            .find(|p| p.is_moderator())
            .map(|p| p.mcp.clone())
            .unwrap_or_else(Mcp::moderator);
        let roster = build_roster(&participants, &personas, &turns);

        let decision = self
            .gateway
            .decide_next_speaker(&moderator_mcp, &meeting.whiteboard, &turns, &roster)
            .await?;

        if let Some(update) = &decision.whiteboard_update {
            meeting.whiteboard.apply(update);
            self.store
                .set_whiteboard(meeting_id, meeting.whiteboard.clone())
                .await?;
            self.events.publish(MeetingEvent::WhiteboardUpdated {
                meeting_id: meeting_id.to_string(),
                whiteboard: meeting.whiteboard.clone(),
            });
        }
        if !decision.moderator_notes.is_empty() {
            debug!(meeting_id, notes = %decision.moderator_notes, "moderator notes");
        }

        let Some(contact) = decision.next_speaker else {
            return self.handle_no_speaker(meeting_id, &meeting, &turns, &moderator_mcp).await;
        };

        let selected = resolve_participant(&contact, &participants, &personas)
            .ok_or_else(|| EngineError::UnknownSpeaker(contact.clone()))?;
        let selected = apply_fairness(
            selected,
            &participants,
            &personas,
            &turns,
            &self.params,
        );

        let persona = ensure_persona(
            self.store.as_ref(),
            self.gateway.as_ref(),
            meeting_id,
            &selected.id,
        )
        .await?;
        let input = self
            .store
            .inputs(meeting_id)
            .await?
            .into_iter()
            .find(|i| i.participant_id == selected.id)
            .map(|i| i.content);

        let response = self
            .gateway
            .persona_respond(&persona, input.as_deref(), &turns)
            .await?;
        if response.chars().count() < self.params.min_response_chars {
            warn!(
                meeting_id,
                speaker = %persona.name,
                length = response.chars().count(),
                "response below minimum length, skipping turn"
            );
            return Ok(TurnOutcome::Skipped {
                speaker: persona.name,
            });
        }

        let metadata = (!decision.moderator_notes.is_empty())
            .then(|| serde_json::json!({ "moderatorNotes": decision.moderator_notes }));
        self.append_turn(meeting_id, Speaker::Ai(persona.name.clone()), response, metadata)
            .await?;
        info!(meeting_id, speaker = %persona.name, "turn appended");
        Ok(TurnOutcome::Spoke {
            speaker: persona.name,
        })
    }

    /// Conclude the meeting with a closing moderator turn.
    pub async fn conclude(
        &self,
        meeting_id: &str,
        reason: &str,
    ) -> Result<TurnOutcome, EngineError> {
        self.append_turn(
            meeting_id,
            Speaker::Moderator,
            format!("The meeting is concluded. {reason}"),
            None,
        )
        .await?;
        self.store
            .set_status(meeting_id, MeetingStatus::Completed)
            .await?;
        self.events.publish(MeetingEvent::StatusChanged {
            meeting_id: meeting_id.to_string(),
            status: MeetingStatus::Completed,
        });
        info!(meeting_id, reason, "meeting concluded");
        Ok(TurnOutcome::Concluded {
            reason: reason.to_string(),
        })
    }

    async fn handle_no_speaker(
        &self,
        meeting_id: &str,
        meeting: &Meeting,
        turns: &[ConversationTurn],
        moderator_mcp: &Mcp,
    ) -> Result<TurnOutcome, EngineError> {
        let check = self
            .gateway
            .check_conclusion(moderator_mcp, &meeting.whiteboard, turns)
            .await?;
        if check.conclude {
            let reason = if check.reason.is_empty() {
                "Objectives met".to_string()
            } else {
                check.reason
            };
            return self.conclude(meeting_id, &reason).await;
        }
        if turns.len() < self.params.min_turns_for_conclusion {
            return self
                .conclude(meeting_id, "Insufficient information to proceed")
                .await;
        }
        if turns.len() >= self.params.stall_turns {
            return self
                .conclude(meeting_id, "The moderator could not select a next speaker")
                .await;
        }
        Ok(TurnOutcome::Waiting)
    }

    async fn pause_deadlocked(
        &self,
        meeting_id: &str,
        reason: String,
    ) -> Result<TurnOutcome, EngineError> {
        self.store
            .set_status(meeting_id, MeetingStatus::Paused)
            .await?;
        self.append_turn(
            meeting_id,
            Speaker::Moderator,
            format!(
                "The discussion appears stuck ({reason}). Pausing until a human participant \
                 weighs in."
            ),
            None,
        )
        .await?;
        self.events.publish(MeetingEvent::StatusChanged {
            meeting_id: meeting_id.to_string(),
            status: MeetingStatus::Paused,
        });
        warn!(meeting_id, reason, "meeting paused on deadlock");
        Ok(TurnOutcome::Paused { reason })
    }

    async fn append_turn(
        &self,
        meeting_id: &str,
        speaker: Speaker,
        message: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        let turn = ConversationTurn {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id: meeting_id.to_string(),
            speaker,
            message,
            created_at: chrono::Utc::now(),
            metadata,
        };
        self.store.append_turn(turn.clone()).await?;
        self.events.publish(MeetingEvent::TurnAppended {
            meeting_id: meeting_id.to_string(),
            turn,
        });
        Ok(())
    }

    fn lock_for(&self, meeting_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(meeting_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

fn build_roster(
    participants: &[Participant],
    personas: &[Persona],
    turns: &[ConversationTurn],
) -> Vec<SpeakerOption> {
    participants
        .iter()
        .map(|participant| {
            let has_spoken = persona_name(personas, &participant.id)
                .map(|name| {
                    turns
                        .iter()
                        .any(|t| t.speaker == Speaker::Ai(name.to_string()))
                })
                .unwrap_or(false);
            SpeakerOption {
                contact: participant.contact.clone(),
                participant_id: participant.id.clone(),
                has_spoken,
            }
        })
        .collect()
}

fn persona_name<'a>(personas: &'a [Persona], participant_id: &str) -> Option<&'a str> {
    personas
        .iter()
        .find(|p| p.participant_id.as_deref() == Some(participant_id))
        .map(|p| p.name.as_str())
}

/// Match the moderator's pick to a participant by contact, falling back to
/// the persona name since models echo either.
fn resolve_participant<'a>(
    contact: &str,
    participants: &'a [Participant],
    personas: &'a [Persona],
) -> Option<&'a Participant> {
    let wanted = contact.trim();
    if let Some(participant) = participants
        .iter()
        .find(|p| p.contact.eq_ignore_ascii_case(wanted))
    {
        return Some(participant);
    }
    personas
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(wanted))
        .and_then(|p| p.participant_id.as_deref())
        .and_then(|id| participants.iter().find(|p| p.id == id))
}

/// Override a speaker who has dominated the recent window.
///
/// Preference order for the replacement: someone who has never spoken, then
/// whoever has been silent the longest. With no alternative the original
/// pick stands.
fn apply_fairness<'a>(
    selected: &'a Participant,
    participants: &'a [Participant],
    personas: &'a [Persona],
    turns: &[ConversationTurn],
    params: &EngineParams,
) -> &'a Participant {
    let window = &turns[turns.len().saturating_sub(params.fairness_window)..];
    let Some(name) = persona_name(personas, &selected.id) else {
        return selected;
    };
    let share = window
        .iter()
        .filter(|t| t.speaker == Speaker::Ai(name.to_string()))
        .count();
    if share < params.fairness_max_share {
        return selected;
    }

    let last_spoke = |participant: &Participant| -> Option<usize> {
        let name = persona_name(personas, &participant.id)?;
        turns
            .iter()
            .rposition(|t| t.speaker == Speaker::Ai(name.to_string()))
    };
    let others: Vec<&Participant> = participants.iter().filter(|p| p.id != selected.id).collect();
    let replacement = others
        .iter()
        .find(|p| last_spoke(p).is_none())
        .copied()
        .or_else(|| {
            others
                .iter()
                .min_by_key(|p| last_spoke(p).unwrap_or(0))
                .copied()
        });
    match replacement {
        Some(other) => {
            info!(
                dominated = %selected.contact,
                replacement = %other.contact,
                share,
                "fairness guard overrode speaker selection"
            );
            other
        }
        None => selected,
    }
}
