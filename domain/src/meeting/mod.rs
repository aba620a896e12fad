//! Meeting domain
//!
//! A meeting moves through a small lifecycle:
//!
//! ```text
//! awaiting_inputs -> running <-> paused -> (running) -> completed
//!          \________________________________________/
//!                           cancelled (from any non-terminal state)
//! ```
//!
//! `completed` and `cancelled` are terminal. The transition table lives on
//! [`entities::MeetingStatus::can_transition`] and is enforced by the
//! application layer before any write.

pub mod entities;

pub use entities::{
    Meeting, MeetingStatus, Participant, ParticipantInput, Whiteboard, WhiteboardUpdate,
};
