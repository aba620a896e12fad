//! Console rendering for transcripts, events, and reports

use roundtable_application::ports::broadcast::MeetingEvent;
use roundtable_domain::{ConversationTurn, Report, Whiteboard};

pub fn banner(title: &str) {
    println!();
    println!("+============================================================+");
    println!("| {title:<58} |");
    println!("+============================================================+");
    println!();
}

pub fn print_event(event: &MeetingEvent) {
    match event {
        MeetingEvent::TurnAppended { turn, .. } => print_turn(turn),
        MeetingEvent::WhiteboardUpdated { whiteboard, .. } => {
            println!("  -- whiteboard updated --");
            print_whiteboard(whiteboard, "  ");
        }
        MeetingEvent::StatusChanged { status, .. } => {
            println!("  -- meeting is now {status:?} --");
        }
    }
}

pub fn print_turn(turn: &ConversationTurn) {
    println!("[{}] {}", turn.speaker, turn.message);
    println!();
}

pub fn print_transcript(turns: &[ConversationTurn]) {
    banner("Transcript");
    for turn in turns {
        print_turn(turn);
    }
}

pub fn print_whiteboard(whiteboard: &Whiteboard, indent: &str) {
    for (label, items) in [
        ("Key facts", &whiteboard.key_facts),
        ("Decisions", &whiteboard.decisions),
        ("Action items", &whiteboard.action_items),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("{indent}{label}:");
        for item in items {
            println!("{indent}  - {item}");
        }
    }
}

pub fn print_report(report: &Report) {
    banner("Final report");
    println!("{}", report.summary.summary);
    println!();
    for (label, items) in [
        ("Highlights", &report.summary.highlights),
        ("Decisions", &report.summary.decisions),
        ("Action items", &report.summary.action_items),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("{label}:");
        for item in items {
            println!("  - {item}");
        }
        println!();
    }

    let graph = &report.summary.graph;
    if !graph.nodes.is_empty() {
        println!("Conversation map:");
        for node in &graph.nodes {
            let exchanges = graph
                .edges
                .iter()
                .filter(|e| e.from == node.id || e.to == node.id)
                .count();
            println!("  {} ({} exchanges)", node.label, exchanges);
        }
    }
}
