pub mod template;

pub use template::{MeetingPrompts, SpeakerOption};
