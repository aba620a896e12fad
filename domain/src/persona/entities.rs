//! Persona entities
//!
//! A persona is either the singleton moderator (fixed profile, no owning
//! participant, created without a model call) or a participant persona
//! generated from that participant's input. Personas are immutable once
//! created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Model-Context-Profile: the structured behavioral profile for a persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mcp {
    pub identity: String,
    pub objectives: Vec<String>,
    pub rules: Vec<String>,
    /// Brief guidance text for the model's output style
    pub output_format: String,
    /// Tool names available to the persona (moderator only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl Mcp {
    /// The first behavioral rule is fixed for every generated persona.
    pub const DIRECTNESS_RULE: &'static str =
        "Do not use pleasantries or greetings. Be direct and task-focused.";

    /// The fixed moderator profile. No model call is involved.
    pub fn moderator() -> Self {
        Self {
            identity: "Meeting Moderator - Efficient Decision Engine".to_string(),
            objectives: vec![
                "Guide conversation toward meeting objectives".to_string(),
                "Maintain and update shared whiteboard".to_string(),
                "Select next speaker each turn".to_string(),
                "Determine when objectives are met".to_string(),
            ],
            rules: vec![
                "Do not use conversational pleasantries, greetings, or verifications. \
                 Your response must be direct, task-focused, and contain only your core \
                 argument or data."
                    .to_string(),
                "Be fair and concise".to_string(),
                "Incorporate human injected messages respectfully".to_string(),
                "Always include whiteboard references".to_string(),
            ],
            output_format: "Plain text message to the group - direct and concise, no fluff"
                .to_string(),
            tools: vec![
                "update_whiteboard".to_string(),
                "select_next_speaker".to_string(),
                "check_for_conclusion".to_string(),
            ],
        }
    }
}

/// Role of a persona within a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    Moderator,
    Participant,
}

/// A persona (Entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub meeting_id: String,
    /// `None` for the moderator
    pub participant_id: Option<String>,
    pub role: PersonaRole,
    pub name: String,
    pub mcp: Mcp,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    pub fn is_moderator(&self) -> bool {
        self.role == PersonaRole::Moderator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderator_profile_is_complete() {
        let mcp = Mcp::moderator();
        assert!(!mcp.identity.is_empty());
        assert_eq!(mcp.objectives.len(), 4);
        assert_eq!(mcp.rules.len(), 4);
        assert!(mcp.tools.contains(&"select_next_speaker".to_string()));
    }

    #[test]
    fn mcp_round_trips_through_json() {
        let mcp = Mcp::moderator();
        let json = serde_json::to_string(&mcp).unwrap();
        let back: Mcp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mcp);
    }

    #[test]
    fn mcp_without_tools_deserializes() {
        let json = r#"{
            "identity": "Pragmatic engineer",
            "objectives": ["Keep scope small"],
            "rules": ["Be direct"],
            "outputFormat": "Concise and direct"
        }"#;
        let mcp: Mcp = serde_json::from_str(json).unwrap();
        assert!(mcp.tools.is_empty());
    }
}
