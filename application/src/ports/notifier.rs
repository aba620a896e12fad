//! Invite notification port
//!
//! Fire-and-forget "send this person their participation link". Failures
//! must never block meeting creation; callers log and move on.

use async_trait::async_trait;
use roundtable_domain::Participant;

#[async_trait]
pub trait InviteNotifier: Send + Sync {
    /// Deliver a participation link to one participant. Errors are reported
    /// as strings for logging only.
    async fn send_invite(&self, participant: &Participant, subject: &str) -> Result<(), String>;
}
