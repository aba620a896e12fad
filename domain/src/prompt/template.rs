//! Prompt templates for the five meeting operations
//!
//! Prompts are deliberately compact: every call goes through a rate limiter
//! with a token-bucket budget, so each builder truncates its context windows
//! before formatting.

use crate::conversation::entities::{ConversationTurn, Speaker};
use crate::meeting::entities::Whiteboard;
use crate::persona::entities::Mcp;

/// One participant the moderator can hand the floor to.
#[derive(Debug, Clone)]
pub struct SpeakerOption {
    pub contact: String,
    pub participant_id: String,
    pub has_spoken: bool,
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Templates for generating prompts at each stage of the meeting.
pub struct MeetingPrompts;

impl MeetingPrompts {
    /// System prompt for persona synthesis.
    pub fn persona_system() -> &'static str {
        r#"You are to produce a JSON object for an AI persona's Model-Context-Profile (MCP).
IMPORTANT: Return ONLY valid JSON, no markdown, no code blocks, no explanations.
Keep descriptions brief (under 30 words each). Limit to 3-4 objectives and 3-4 rules."#
    }

    /// User prompt for persona synthesis from a participant's raw input.
    pub fn persona_synthesis(input: &str, subject: &str, display_name: Option<&str>) -> String {
        let name_hint = match display_name {
            Some(name) => format!("\nParticipant Name: {name} (use this name for the persona)"),
            None => String::new(),
        };
        let name_rule = match display_name {
            Some(name) => format!("Use \"{name}\" as the persona name."),
            None => "Create a descriptive persona name.".to_string(),
        };
        format!(
            r#"Meeting Subject: {subject}
Participant Input: {input}{name_hint}

Generate a persona for an efficient decision-making meeting.

CRITICAL: First rule must be:
"Do not use pleasantries or greetings. Be direct and task-focused."

{name_rule}

Return ONLY this JSON (no markdown, keep it concise):
{{
  "name": "PersonaName",
  "mcp": {{
    "identity": "Brief description (under 30 words)",
    "objectives": ["Objective 1", "Objective 2", "Objective 3"],
    "rules": [
      "Do not use pleasantries or greetings. Be direct and task-focused.",
      "Rule 2",
      "Rule 3"
    ],
    "outputFormat": "Concise and direct"
  }}
}}"#
        )
    }

    /// Detect a participant directly addressed by name in the last message.
    ///
    /// Looks for `<name>, what ...` / `<name> can you ...` style phrasings
    /// and returns the addressed name when it matches a roster contact.
    pub fn direct_address<'a>(
        last_message: &str,
        roster: &'a [SpeakerOption],
    ) -> Option<&'a SpeakerOption> {
        const SINGLE: &[&str] = &["what", "how", "why"];
        const PAIRS: &[(&str, &str)] = &[
            ("do", "you"),
            ("can", "you"),
            ("would", "you"),
            ("could", "you"),
            ("should", "we"),
        ];
        let words: Vec<String> = last_message
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .collect();
        for i in 0..words.len().saturating_sub(1) {
            let name = &words[i];
            if name.is_empty() {
                continue;
            }
            let follows = SINGLE.contains(&words[i + 1].as_str())
                || (i + 2 < words.len()
                    && PAIRS.contains(&(words[i + 1].as_str(), words[i + 2].as_str())));
            if !follows {
                continue;
            }
            if let Some(option) = roster
                .iter()
                .filter(|o| o.has_spoken)
                .find(|o| o.contact.to_lowercase().contains(name.as_str()))
            {
                return Some(option);
            }
        }
        None
    }

    /// The selection instruction ladder for the next-speaker prompt.
    ///
    /// Precedence: directly addressed participant, then anyone who has not
    /// spoken, then alternation away from the previous speaker, then anyone
    /// (or "none" when the moderator judges the discussion stuck).
    pub fn selection_instruction(roster: &[SpeakerOption], last_turn: Option<&ConversationTurn>) -> String {
        let last_message = last_turn.map(|t| t.message.as_str()).unwrap_or("");
        let last_speaker = last_turn
            .map(|t| t.speaker.to_string())
            .unwrap_or_else(|| "none".to_string());
        let last_name = match last_turn.map(|t| &t.speaker) {
            Some(Speaker::Ai(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        if let Some(addressed) = Self::direct_address(last_message, roster) {
            return format!(
                "QUESTION ASKED TO {contact}. Let them respond. Pick: {contact}",
                contact = addressed.contact
            );
        }

        let not_spoken: Vec<&str> = roster
            .iter()
            .filter(|o| !o.has_spoken)
            .map(|o| o.contact.as_str())
            .collect();
        if !not_spoken.is_empty() {
            return format!("Pick from: {}", not_spoken.join(", "));
        }

        let spoke: Vec<&SpeakerOption> = roster.iter().filter(|o| o.has_spoken).collect();
        let others: Vec<&str> = spoke
            .iter()
            .filter(|o| !last_name.to_lowercase().contains(&o.contact.to_lowercase()))
            .map(|o| o.contact.as_str())
            .collect();
        if !others.is_empty() {
            return format!(
                "ALTERNATE SPEAKERS. Last was {last_speaker}. Pick from: {}",
                others.join(", ")
            );
        }
        if !spoke.is_empty() {
            return format!(
                "All spoke. Pick from: {} or \"none\" if stuck.",
                spoke
                    .iter()
                    .map(|o| o.contact.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        "No participants available. Pick \"none\".".to_string()
    }

    /// User prompt for next-speaker selection.
    ///
    /// `recent` should already be limited to the trailing window (~5 turns).
    pub fn next_speaker(
        _moderator: &Mcp,
        _whiteboard: &Whiteboard,
        recent: &[ConversationTurn],
        roster: &[SpeakerOption],
    ) -> String {
        let last = recent.last();
        let last_line = match last {
            Some(turn) => format!("{}: \"{}\"", turn.speaker, truncate(&turn.message, 150)),
            None => "none".to_string(),
        };
        let human_context = {
            let human: Vec<String> = recent
                .iter()
                .filter(|t| t.speaker.is_human())
                .map(|t| format!("{}: \"{}\"", t.speaker, truncate(&t.message, 100)))
                .collect();
            if human.is_empty() {
                String::new()
            } else {
                format!(
                    "\nRECENT HUMAN INPUT (IMPORTANT - RESPOND TO THIS): {}",
                    human.join(" | ")
                )
            }
        };
        let instruction = Self::selection_instruction(roster, last);
        format!(
            r#"Last: {last_line}{human_context}
{instruction}
{{"nextSpeaker":"contact or none","moderatorNotes":"brief","whiteboardUpdate":{{"keyFacts":["brief"],"decisions":[],"actionItems":[]}}}}"#
        )
    }

    /// User prompt for a persona's contribution. Plain text response, soft
    /// 70-word budget. `recent` is the trailing transcript window (~8 turns).
    pub fn persona_response(
        persona_name: &str,
        mcp: &Mcp,
        participant_input: Option<&str>,
        recent: &[ConversationTurn],
    ) -> String {
        let own_tag = Speaker::Ai(persona_name.to_string());
        let own_messages: Vec<String> = recent
            .iter()
            .filter(|t| t.speaker == own_tag)
            .map(|t| truncate(&t.message, 80))
            .collect();
        let own_history = if own_messages.is_empty() {
            String::new()
        } else {
            format!(
                "\nYOU ALREADY SAID: {}\nDO NOT REPEAT THESE POINTS.",
                own_messages.join(" | ")
            )
        };
        let human: Vec<String> = recent
            .iter()
            .filter(|t| t.speaker.is_human())
            .map(|t| format!("{}: \"{}\"", t.speaker, truncate(&t.message, 100)))
            .collect();
        let human_context = if human.is_empty() {
            String::new()
        } else {
            format!("\nHUMAN INPUT (RESPOND TO THIS): {}", human.join(" | "))
        };
        let input_line = match participant_input {
            Some(input) => format!("Your original input: \"{}\"", truncate(input, 150)),
            None => String::new(),
        };
        let discussion: Vec<String> = recent
            .iter()
            .map(|t| format!("{}: {}", t.speaker, truncate(&t.message, 60)))
            .collect();
        format!(
            r#"You: {persona_name}
Identity: {identity}
{input_line}{own_history}{human_context}

Recent discussion: {discussion}

CRITICAL RULES:
1. CHECK your previous messages above - say something COMPLETELY NEW
2. BUILD ON what others said - find common ground, acknowledge valid points
3. Make CONCESSIONS or COMPROMISES when appropriate - meetings require give-and-take
4. Propose SPECIFIC solutions that integrate multiple viewpoints
5. If you've made your point, SUPPORT others' ideas or add NEW information
6. If stuck, suggest creative alternatives or ask clarifying questions

Max 70 words. Focus on NEW CONTRIBUTIONS not repetition."#,
            identity = truncate(&mcp.identity, 120),
            discussion = discussion.join(" | "),
        )
    }

    /// System prompt for the conclusion check.
    pub fn conclusion_system() -> &'static str {
        r#"You are analyzing whether a meeting has reached its conclusion.
IMPORTANT: Return ONLY valid JSON, no markdown, no code blocks, no explanations.
Keep your reason under 50 words."#
    }

    /// User prompt for the conclusion check. `recent` is the last ~3 turns.
    pub fn conclusion(moderator: &Mcp, whiteboard: &Whiteboard, recent_turns: usize) -> String {
        let facts: Vec<&String> = whiteboard.key_facts.iter().take(5).collect();
        let decisions: Vec<&String> = whiteboard.decisions.iter().take(5).collect();
        format!(
            r#"Check if meeting objectives are met.
MCP Objectives: {objectives}
Whiteboard Key Facts: {facts}
Whiteboard Decisions: {decisions}
Recent Turns: {recent_turns}

Return ONLY this JSON structure (no markdown):
{{ "conclude": boolean, "reason": "brief explanation under 50 words" }}"#,
            objectives = serde_json::to_string(&moderator.objectives).unwrap_or_default(),
            facts = serde_json::to_string(&facts).unwrap_or_default(),
            decisions = serde_json::to_string(&decisions).unwrap_or_default(),
        )
    }

    /// System prompt for final summarization.
    pub fn summary_system() -> &'static str {
        "Create meeting summary as JSON only."
    }

    /// User prompt for final summarization. `recent` is the last ~10 turns;
    /// each message is truncated to keep the prompt small.
    pub fn summary(whiteboard: &Whiteboard, recent: &[ConversationTurn]) -> String {
        let turns: Vec<serde_json::Value> = recent
            .iter()
            .map(|t| {
                serde_json::json!({
                    "speaker": t.speaker.to_string(),
                    "msg": truncate(&t.message, 150),
                })
            })
            .collect();
        format!(
            r#"Summarize this meeting:
Facts: {facts}
Decisions: {decisions}
Actions: {actions}
Turns: {turns}

JSON only:
{{"summary":"100 words","highlights":["point"],"decisions":["decision"],"actionItems":["action"],"visualMap":{{"nodes":[],"edges":[]}}}}"#,
            facts = serde_json::to_string(&whiteboard.key_facts).unwrap_or_default(),
            decisions = serde_json::to_string(&whiteboard.decisions).unwrap_or_default(),
            actions = serde_json::to_string(&whiteboard.action_items).unwrap_or_default(),
            turns = serde_json::to_string(&turns).unwrap_or_default(),
        )
    }
}
