//! Invite delivery
//!
//! The CLI has no mail transport, so invites are surfaced through the log:
//! the operator copies the participation token to whoever needs it. A real
//! deployment would put an SMTP adapter behind the same port.

use async_trait::async_trait;
use roundtable_application::ports::notifier::InviteNotifier;
use roundtable_domain::Participant;
use tracing::info;

#[derive(Default)]
pub struct LogInviteNotifier;

impl LogInviteNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InviteNotifier for LogInviteNotifier {
    async fn send_invite(&self, participant: &Participant, subject: &str) -> Result<(), String> {
        info!(
            contact = %participant.contact,
            token = %participant.token,
            subject = %subject,
            "invite ready; share the token with this participant"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn logging_delivery_always_succeeds() {
        let participant = Participant {
            id: "p1".to_string(),
            meeting_id: "m1".to_string(),
            contact: "alice@example.com".to_string(),
            token: "tok-p1".to_string(),
            has_submitted: false,
            created_at: Utc::now(),
        };
        let notifier = LogInviteNotifier::new();
        assert!(notifier.send_invite(&participant, "Roadmap").await.is_ok());
    }
}
