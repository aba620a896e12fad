pub mod entities;

pub use entities::{ConversationGraph, GraphEdge, GraphNode, MeetingSummary, Report};
