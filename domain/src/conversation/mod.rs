//! Conversation domain
//!
//! Turns are the append-only transcript of a meeting. Deadlock detection is
//! pure analysis over a recent window of turns; it never does I/O.

pub mod deadlock;
pub mod entities;

pub use deadlock::{detect_deadlock, DeadlockConfig, DeadlockVerdict};
pub use entities::{ConversationTurn, Speaker};
