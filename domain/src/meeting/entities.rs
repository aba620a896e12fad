//! Meeting domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    /// Waiting for every participant to submit their input
    AwaitingInputs,
    /// The turn engine is actively driving the conversation
    Running,
    /// Suspended, either by request or by deadlock detection
    Paused,
    /// Concluded and reported; terminal
    Completed,
    /// Administratively cancelled; terminal
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            MeetingStatus::AwaitingInputs => "awaiting_inputs",
            MeetingStatus::Running => "running",
            MeetingStatus::Paused => "paused",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Completed | MeetingStatus::Cancelled)
    }

    /// The lifecycle edge table.
    ///
    /// `cancelled` is reachable from any non-terminal state; everything else
    /// follows the awaiting_inputs -> running <-> paused -> completed chain.
    pub fn can_transition(&self, to: MeetingStatus) -> bool {
        use MeetingStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (_, Cancelled) => true,
            (AwaitingInputs, Running) => true,
            (Running, Paused) => true,
            (Paused, Running) => true,
            (Running, Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared mutable summary visible to all personas and observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Whiteboard {
    pub key_facts: Vec<String>,
    pub decisions: Vec<String>,
    pub action_items: Vec<String>,
}

impl Whiteboard {
    pub fn is_empty(&self) -> bool {
        self.key_facts.is_empty() && self.decisions.is_empty() && self.action_items.is_empty()
    }

    /// Apply a model-directed update.
    ///
    /// The default policy appends new items to each provided category, so
    /// whiteboard lists are monotonically non-decreasing. A category is
    /// replaced outright only when the update explicitly asks for it.
    pub fn apply(&mut self, update: &WhiteboardUpdate) {
        fn merge(target: &mut Vec<String>, items: &Option<Vec<String>>, replace: bool) {
            if let Some(items) = items {
                if replace {
                    *target = items.clone();
                } else {
                    target.extend(items.iter().cloned());
                }
            }
        }
        merge(&mut self.key_facts, &update.key_facts, update.replace);
        merge(&mut self.decisions, &update.decisions, update.replace);
        merge(&mut self.action_items, &update.action_items, update.replace);
    }
}

/// Partial whiteboard update emitted by the moderator.
///
/// Absent categories are left untouched. `replace` switches the merge from
/// append (the default) to whole-category replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhiteboardUpdate {
    pub key_facts: Option<Vec<String>>,
    pub decisions: Option<Vec<String>>,
    pub action_items: Option<Vec<String>>,
    pub replace: bool,
}

impl WhiteboardUpdate {
    pub fn is_empty(&self) -> bool {
        self.key_facts.is_none() && self.decisions.is_none() && self.action_items.is_none()
    }
}

/// A meeting (Entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub subject: String,
    pub details: String,
    pub status: MeetingStatus,
    pub whiteboard: Whiteboard,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            details: details.into(),
            status: MeetingStatus::AwaitingInputs,
            whiteboard: Whiteboard::default(),
            created_at: Utc::now(),
        }
    }
}

/// A human participant invited to a meeting (Entity)
///
/// The access token is single-use and opaque; it never rotates. The
/// `has_submitted` flag only moves false -> true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub meeting_id: String,
    /// Contact handle: an email address or a plain display name
    pub contact: String,
    pub token: String,
    pub has_submitted: bool,
    pub created_at: DateTime<Utc>,
}

/// The one piece of free text a participant contributes before the
/// conversation starts. Immutable once created; at most one per participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub id: String,
    pub participant_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
