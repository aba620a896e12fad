//! Final report entities
//!
//! A report is generated at most once per meeting; a second generation
//! attempt must return the existing report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::entities::ConversationTurn;
use crate::meeting::entities::Whiteboard;

/// A node in the conversation graph: one distinct speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

/// An edge: two speakers held adjacent turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Nodes are speakers, edges the adjacency of consecutive turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ConversationGraph {
    /// Derive the graph directly from transcript adjacency.
    ///
    /// Used as the fallback when the model's own visual map is missing or
    /// malformed.
    pub fn from_turns(turns: &[ConversationTurn]) -> Self {
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut edges: Vec<GraphEdge> = Vec::new();
        for turn in turns {
            let tag = turn.speaker.to_string();
            if !nodes.iter().any(|n| n.id == tag) {
                nodes.push(GraphNode {
                    id: tag.clone(),
                    label: tag.clone(),
                });
            }
        }
        for pair in turns.windows(2) {
            let from = pair[0].speaker.to_string();
            let to = pair[1].speaker.to_string();
            if from != to && !edges.iter().any(|e| e.from == from && e.to == to) {
                edges.push(GraphEdge { from, to });
            }
        }
        Self { nodes, edges }
    }
}

/// Structured summary produced by the final summarization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default, alias = "visualMap")]
    pub graph: ConversationGraph,
}

impl MeetingSummary {
    /// Canned result for a meeting that concluded before any turn occurred.
    /// Produced without a model call.
    pub fn empty_meeting() -> Self {
        Self {
            summary: "No conversation took place. The meeting concluded without substantive \
                      discussion."
                .to_string(),
            highlights: vec!["Meeting concluded immediately".to_string()],
            decisions: vec![],
            action_items: vec![],
            graph: ConversationGraph::default(),
        }
    }

    /// Fallback assembled from durable state when summarization output could
    /// not be parsed.
    pub fn fallback(whiteboard: &Whiteboard, turns: &[ConversationTurn]) -> Self {
        let highlights = turns
            .iter()
            .rev()
            .take(5)
            .map(|t| {
                let snippet: String = t.message.chars().take(50).collect();
                format!("{}: {}", t.speaker, snippet)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Self {
            summary: format!(
                "Meeting discussion involved {} conversation turns. Summary generation failed \
                 due to a parsing error.",
                turns.len()
            ),
            highlights,
            decisions: whiteboard.decisions.clone(),
            action_items: whiteboard.action_items.clone(),
            graph: ConversationGraph::from_turns(turns),
        }
    }
}

/// The persisted final report (Entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub meeting_id: String,
    pub summary: MeetingSummary,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::entities::Speaker;

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

    #[test]
    fn graph_from_turns_links_consecutive_speakers() {
        let turns = vec![
            turn(Speaker::Moderator, "Welcome"),
            turn(Speaker::Ai("Alice".into()), "Point one"),
            turn(Speaker::Ai("Bob".into()), "Point two"),
            turn(Speaker::Ai("Alice".into()), "Reply"),
        ];
        let graph = ConversationGraph::from_turns(&turns);
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "AI:Alice" && e.to == "AI:Bob"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == "AI:Bob" && e.to == "AI:Alice"));
    }

    #[test]
    fn graph_skips_self_edges() {
        let turns = vec![
            turn(Speaker::Ai("Alice".into()), "one"),
            turn(Speaker::Ai("Alice".into()), "two"),
        ];
        let graph = ConversationGraph::from_turns(&turns);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn empty_meeting_summary_needs_no_model() {
        let summary = MeetingSummary::empty_meeting();
        assert!(summary.summary.contains("No conversation"));
        assert!(summary.decisions.is_empty());
    }

    #[test]
    fn fallback_carries_whiteboard_decisions() {
        let whiteboard = Whiteboard {
            decisions: vec!["ship it".to_string()],
            ..Default::default()
        };
        let turns = vec![turn(Speaker::Ai("Alice".into()), "long deliberation text here")];
        let summary = MeetingSummary::fallback(&whiteboard, &turns);
        assert_eq!(summary.decisions, ["ship it"]);
        assert_eq!(summary.highlights.len(), 1);
    }
}
