//! Real-time broadcast port
//!
//! The core emits three events outward, scoped to a meeting. Delivery is
//! best-effort: no ack, no replay; late subscribers fetch current state
//! through the store.

use roundtable_domain::{ConversationTurn, MeetingStatus, Whiteboard};

/// An event observers may care about.
#[derive(Debug, Clone)]
pub enum MeetingEvent {
    TurnAppended {
        meeting_id: String,
        turn: ConversationTurn,
    },
    WhiteboardUpdated {
        meeting_id: String,
        whiteboard: Whiteboard,
    },
    StatusChanged {
        meeting_id: String,
        status: MeetingStatus,
    },
}

impl MeetingEvent {
    pub fn meeting_id(&self) -> &str {
        match self {
            MeetingEvent::TurnAppended { meeting_id, .. }
            | MeetingEvent::WhiteboardUpdated { meeting_id, .. }
            | MeetingEvent::StatusChanged { meeting_id, .. } => meeting_id,
        }
    }
}

/// Outward event sink. Implementations must never fail the caller.
pub trait EventBroadcaster: Send + Sync {
    fn publish(&self, event: MeetingEvent);
}

/// No-op broadcaster for tests and headless runs.
pub struct NoBroadcast;

impl EventBroadcaster for NoBroadcast {
    fn publish(&self, _event: MeetingEvent) {}
}
