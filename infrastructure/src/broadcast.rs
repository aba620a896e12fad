//! Broadcast channel event bus
//!
//! Fan-out [`EventBroadcaster`] on top of `tokio::sync::broadcast`. Slow
//! subscribers lose old events rather than applying backpressure; they
//! re-read current state from the store when that happens.

use roundtable_application::ports::broadcast::{EventBroadcaster, MeetingEvent};
use tokio::sync::broadcast;
use tracing::trace;

pub struct BroadcastBus {
    sender: broadcast::Sender<MeetingEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeetingEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBroadcaster for BroadcastBus {
    fn publish(&self, event: MeetingEvent) {
        trace!(meeting_id = %event.meeting_id(), "publishing meeting event");
        // send only fails when nobody is subscribed, which is fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_domain::MeetingStatus;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = BroadcastBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(MeetingEvent::StatusChanged {
            meeting_id: "m1".to_string(),
            status: MeetingStatus::Running,
        });

        match rx.recv().await.unwrap() {
            MeetingEvent::StatusChanged { meeting_id, status } => {
                assert_eq!(meeting_id, "m1");
                assert_eq!(status, MeetingStatus::Running);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = BroadcastBus::new(8);
        bus.publish(MeetingEvent::StatusChanged {
            meeting_id: "m1".to_string(),
            status: MeetingStatus::Cancelled,
        });
    }
}
