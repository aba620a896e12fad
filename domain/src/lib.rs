//! Domain layer for roundtable
//!
//! This crate contains the core meeting entities, value objects, and pure
//! logic. It has no dependencies on infrastructure or runtime concerns.
//!
//! # Core Concepts
//!
//! ## Meeting
//!
//! An asynchronous discussion between AI personas (one per human
//! participant) driven by a moderator, accumulating shared state on a
//! whiteboard until its objectives are met.
//!
//! ## Persona
//!
//! An LLM-driven role bound to a participant's submitted input (or the
//! fixed moderator), defined by a Model-Context-Profile: identity,
//! objectives, behavioral rules, and an output-format hint.
//!
//! ## Deadlock detection
//!
//! Heuristic analysis of recent turns deciding whether the conversation is
//! going in circles and needs human intervention.

pub mod conversation;
pub mod core;
pub mod meeting;
pub mod parsing;
pub mod persona;
pub mod prompt;
pub mod report;
pub mod tokens;

// Re-export commonly used types
pub use conversation::deadlock::{detect_deadlock, DeadlockConfig, DeadlockVerdict};
pub use conversation::entities::{ConversationTurn, Speaker};
pub use core::error::DomainError;
pub use meeting::entities::{
    Meeting, MeetingStatus, Participant, ParticipantInput, Whiteboard, WhiteboardUpdate,
};
pub use parsing::{decode_json, extract_json_object, ParseFailure};
pub use persona::entities::{Mcp, Persona, PersonaRole};
pub use prompt::template::{MeetingPrompts, SpeakerOption};
pub use report::entities::{ConversationGraph, GraphEdge, GraphNode, MeetingSummary, Report};
pub use tokens::{estimate_input_tokens, estimate_tokens, OutputClass, TokenUsage};
