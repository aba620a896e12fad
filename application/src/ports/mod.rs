//! Ports: interfaces the application layer depends on
//!
//! Implementations (adapters) live in the infrastructure layer and are
//! injected at process start.

pub mod broadcast;
pub mod model_client;
pub mod notifier;
pub mod store;

pub use broadcast::{EventBroadcaster, MeetingEvent, NoBroadcast};
pub use model_client::{FinishReason, ModelClient, ModelError, ModelReply, ModelRequest};
pub use notifier::InviteNotifier;
pub use store::{MeetingStore, StoreError};
