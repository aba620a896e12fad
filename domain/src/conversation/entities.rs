//! Conversation turn entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::error::DomainError;

/// Who produced a turn.
///
/// Rendered into the transcript as `Moderator`, `AI:<persona name>`, or
/// `Human:<author>`; parsing accepts the same tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Speaker {
    Moderator,
    Ai(String),
    Human(String),
}

impl Speaker {
    pub fn is_ai(&self) -> bool {
        matches!(self, Speaker::Ai(_))
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Speaker::Human(_))
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::Moderator => write!(f, "Moderator"),
            Speaker::Ai(name) => write!(f, "AI:{name}"),
            Speaker::Human(author) => write!(f, "Human:{author}"),
        }
    }
}

impl FromStr for Speaker {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Moderator" {
            Ok(Speaker::Moderator)
        } else if let Some(name) = s.strip_prefix("AI:") {
            Ok(Speaker::Ai(name.to_string()))
        } else if let Some(author) = s.strip_prefix("Human:") {
            Ok(Speaker::Human(author.to_string()))
        } else {
            Err(DomainError::InvalidSpeakerTag(s.to_string()))
        }
    }
}

/// One atomic (speaker, message) contribution appended to a meeting's
/// transcript. Append-only; ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub meeting_id: String,
    pub speaker: Speaker,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_tags_round_trip() {
        for speaker in [
            Speaker::Moderator,
            Speaker::Ai("Alice".to_string()),
            Speaker::Human("Host".to_string()),
        ] {
            let tag = speaker.to_string();
            assert_eq!(tag.parse::<Speaker>().unwrap(), speaker);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!("Robot:Alice".parse::<Speaker>().is_err());
        assert!("moderator".parse::<Speaker>().is_err());
    }

    #[test]
    fn ai_display_matches_transcript_format() {
        assert_eq!(Speaker::Ai("Kai (AI)".to_string()).to_string(), "AI:Kai (AI)");
    }
}
