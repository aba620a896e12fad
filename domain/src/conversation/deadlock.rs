//! Deadlock / repetition detection
//!
//! Heuristic analysis of recent turns deciding whether the conversation is
//! going in circles and needs human input. Pure domain logic, no I/O.
//!
//! Three signals, any one of which flags a deadlock:
//!
//! 1. **Keyword repetition**: several debate phrases each recurring across
//!    multiple AI messages suggests a circular argument.
//! 2. **Ping-pong**: exactly two AI speakers strictly alternating over the
//!    recent AI turns suggests a standoff.
//! 3. **Formulaic length**: the last AI messages all having nearly the same
//!    length suggests templated, stuck responses.
//!
//! Detection is suppressed entirely while a human message sits in the recent
//! window: human input is presumed to break any stalemate.

use serde::{Deserialize, Serialize};

use crate::conversation::entities::ConversationTurn;

/// Debate phrases whose repetition across messages signals a circular
/// discussion.
const DEBATE_PHRASES: &[&str] = &[
    "however",
    "but",
    "on the other hand",
    "alternatively",
    "conversely",
    "i disagree",
    "i agree",
    "consider",
    "we should",
    "perhaps",
    "suggest",
    "recommend",
    "propose",
    "think about",
    "what if",
    "concern",
    "worry",
    "risk",
    "issue",
    "problem",
];

/// Tunable thresholds for deadlock detection.
///
/// These are empirically tuned values carried over as configuration rather
/// than hard-coded constants; there is no evidence they are optimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlockConfig {
    /// How many recent turns to analyze
    pub window: usize,
    /// Minimum AI turns in the window before judging at all
    pub min_ai_turns: usize,
    /// A human message within this many trailing turns suppresses detection
    pub human_suppress_window: usize,
    /// How many distinct phrases must recur to flag keyword repetition
    pub min_repeated_phrases: usize,
    /// How many AI messages a phrase must appear in to count as recurring
    pub min_phrase_occurrences: usize,
    /// How many trailing AI turns the ping-pong check looks at
    pub ping_pong_window: usize,
    /// Relative deviation from the mean under which message lengths are
    /// considered "all similar" (0.3 = within 30%)
    pub length_similarity: f64,
    /// How many trailing AI messages the length check compares
    pub length_window: usize,
}

impl Default for DeadlockConfig {
    fn default() -> Self {
        Self {
            window: 6,
            min_ai_turns: 3,
            human_suppress_window: 5,
            min_repeated_phrases: 2,
            min_phrase_occurrences: 2,
            ping_pong_window: 4,
            length_similarity: 0.3,
            length_window: 3,
        }
    }
}

/// Outcome of a deadlock check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadlockVerdict {
    Clear,
    Deadlocked { reason: String },
}

impl DeadlockVerdict {
    pub fn is_deadlocked(&self) -> bool {
        matches!(self, DeadlockVerdict::Deadlocked { .. })
    }
}

/// Analyze the transcript tail for repetition patterns.
///
/// `history` must be in chronological order (oldest first).
pub fn detect_deadlock(history: &[ConversationTurn], config: &DeadlockConfig) -> DeadlockVerdict {
    if history.len() < 4 {
        return DeadlockVerdict::Clear;
    }

    // Human input breaks any stalemate; skip detection while one is recent.
    let suppress_tail = history
        .len()
        .saturating_sub(config.human_suppress_window);
    if history[suppress_tail..].iter().any(|t| t.speaker.is_human()) {
        return DeadlockVerdict::Clear;
    }

    let window_start = history.len().saturating_sub(config.window);
    let ai_turns: Vec<&ConversationTurn> = history[window_start..]
        .iter()
        .filter(|t| t.speaker.is_ai())
        .collect();

    if ai_turns.len() < config.min_ai_turns {
        return DeadlockVerdict::Clear;
    }

    let messages: Vec<String> = ai_turns.iter().map(|t| t.message.to_lowercase()).collect();

    // Signal 1: debate phrases each recurring across multiple messages
    let repeated: Vec<&str> = DEBATE_PHRASES
        .iter()
        .filter(|phrase| {
            messages.iter().filter(|m| m.contains(**phrase)).count()
                >= config.min_phrase_occurrences
        })
        .copied()
        .collect();
    if repeated.len() >= config.min_repeated_phrases {
        return DeadlockVerdict::Deadlocked {
            reason: format!(
                "Circular discussion pattern - debate phrases repeated: {}",
                repeated.join(", ")
            ),
        };
    }

    // Signal 2: exactly two AI speakers strictly alternating
    if ai_turns.len() >= config.ping_pong_window {
        let tail = &ai_turns[ai_turns.len() - config.ping_pong_window..];
        let speakers: Vec<&_> = tail.iter().map(|t| &t.speaker).collect();
        let mut unique = speakers.clone();
        unique.sort_by_key(|s| s.to_string());
        unique.dedup();
        let alternating = speakers.windows(2).all(|w| w[0] != w[1]);
        if unique.len() == 2 && alternating {
            return DeadlockVerdict::Deadlocked {
                reason: "Two AI personas alternating back and forth - likely at a standoff"
                    .to_string(),
            };
        }
    }

    // Signal 3: recent messages all of nearly identical length
    if messages.len() >= config.length_window {
        let lengths: Vec<f64> = messages[messages.len() - config.length_window..]
            .iter()
            .map(|m| m.len() as f64)
            .collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        if mean > 0.0
            && lengths
                .iter()
                .all(|len| (len - mean).abs() < mean * config.length_similarity)
        {
            return DeadlockVerdict::Deadlocked {
                reason: "AI responses following similar pattern - conversation may be stuck"
                    .to_string(),
            };
        }
    }

    DeadlockVerdict::Clear
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::entities::Speaker;
    use chrono::Utc;

    fn turn(speaker: Speaker, message: &str) -> ConversationTurn {
        ConversationTurn {
            id: "t".to_string(),
            meeting_id: "m".to_string(),
            speaker,
            message: message.to_string(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    fn alternating_history() -> Vec<ConversationTurn> {
        // Varied lengths so only the ping-pong signal can fire
        vec![
            turn(Speaker::Ai("Alice".into()), "We need the caching layer first, before anything else lands."),
            turn(Speaker::Ai("Bob".into()), "No."),
            turn(
                Speaker::Ai("Alice".into()),
                "The caching layer unblocks every downstream team and has been on the roadmap for two quarters now.",
            ),
            turn(Speaker::Ai("Bob".into()), "Still no, auth comes first."),
        ]
    }

    #[test]
    fn two_speakers_alternating_is_deadlock() {
        let verdict = detect_deadlock(&alternating_history(), &DeadlockConfig::default());
        assert!(verdict.is_deadlocked());
    }

    #[test]
    fn human_turn_in_window_suppresses_detection() {
        let mut history = alternating_history();
        // Insert a human message at position -2
        history.insert(
            history.len() - 1,
            turn(Speaker::Human("Host".into()), "Let's do both in parallel."),
        );
        let verdict = detect_deadlock(&history, &DeadlockConfig::default());
        assert_eq!(verdict, DeadlockVerdict::Clear);
    }

    #[test]
    fn repeated_debate_phrases_are_a_deadlock() {
        let history = vec![
            turn(Speaker::Ai("Alice".into()), "However, I have a concern about the cost."),
            turn(Speaker::Ai("Bob".into()), "However, my concern is the schedule, which is tight."),
            turn(Speaker::Ai("Carol".into()), "That risk is real."),
            turn(Speaker::Ai("Alice".into()), "However the concern stands and the risk compounds over time."),
        ];
        let verdict = detect_deadlock(&history, &DeadlockConfig::default());
        match verdict {
            DeadlockVerdict::Deadlocked { reason } => {
                assert!(reason.contains("however"), "{reason}");
            }
            DeadlockVerdict::Clear => panic!("expected deadlock"),
        }
    }

    #[test]
    fn similar_message_lengths_are_a_deadlock() {
        // Three distinct speakers (no ping-pong), no debate phrases, lengths
        // within 30% of the mean.
        let history = vec![
            turn(Speaker::Ai("Alice".into()), "The plan works for my team fine."),
            turn(Speaker::Ai("Bob".into()), "The plan works for us as well.."),
            turn(Speaker::Ai("Carol".into()), "The plan is acceptable over here."),
            turn(Speaker::Ai("Alice".into()), "Nothing further to add from me.."),
        ];
        let verdict = detect_deadlock(&history, &DeadlockConfig::default());
        assert!(verdict.is_deadlocked());
    }

    #[test]
    fn short_history_is_never_deadlocked() {
        let history = vec![
            turn(Speaker::Ai("Alice".into()), "However, a concern."),
            turn(Speaker::Ai("Bob".into()), "However, a concern."),
        ];
        assert_eq!(
            detect_deadlock(&history, &DeadlockConfig::default()),
            DeadlockVerdict::Clear
        );
    }

    #[test]
    fn too_few_ai_turns_is_clear() {
        let history = vec![
            turn(Speaker::Moderator, "Welcome."),
            turn(Speaker::Moderator, "Agenda follows."),
            turn(Speaker::Moderator, "First item."),
            turn(Speaker::Ai("Alice".into()), "However, I have a concern."),
        ];
        assert_eq!(
            detect_deadlock(&history, &DeadlockConfig::default()),
            DeadlockVerdict::Clear
        );
    }
}
