//! Infrastructure layer for roundtable
//!
//! Adapters behind the application layer's ports: the in-memory meeting
//! store, the Gemini HTTP model client, the broadcast event bus, the
//! logging invite notifier, and configuration-file loading.

pub mod broadcast;
pub mod config;
pub mod model;
pub mod notifier;
pub mod store;

pub use broadcast::BroadcastBus;
pub use config::{ConfigLoader, FileConfig, ModelConfig};
pub use model::{GeminiClient, GeminiConfig};
pub use notifier::LogInviteNotifier;
pub use store::InMemoryStore;
