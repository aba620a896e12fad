//! Final report generation
//!
//! At most one report exists per meeting. Regeneration returns the stored
//! one; the summarization call only ever runs for the first request.

use std::sync::Arc;
use tracing::info;

use roundtable_domain::{ConversationGraph, MeetingStatus, Report};

use crate::gateway::ModelGateway;
use crate::ports::store::{MeetingStore, StoreError};
use crate::use_cases::EngineError;

pub struct ReportService {
    store: Arc<dyn MeetingStore>,
    gateway: Arc<ModelGateway>,
}

impl ReportService {
    pub fn new(store: Arc<dyn MeetingStore>, gateway: Arc<ModelGateway>) -> Self {
        Self { store, gateway }
    }

    /// Generate (or fetch) the report for a concluded meeting.
    ///
    /// Only Completed and Cancelled meetings can be reported on; a meeting
    /// still collecting inputs, running, or paused is rejected.
    pub async fn generate_report(&self, meeting_id: &str) -> Result<Report, EngineError> {
        if let Some(existing) = self.store.report(meeting_id).await? {
            return Ok(existing);
        }

        let meeting = self.store.meeting(meeting_id).await?;
        if !meeting.status.is_terminal() {
            return Err(EngineError::MeetingNotConcluded {
                status: meeting.status,
            });
        }

        let turns = self.store.turns(meeting_id).await?;
        let mut summary = self.gateway.summarize(&meeting.whiteboard, &turns).await?;
        if summary.graph.nodes.is_empty() {
            summary.graph = ConversationGraph::from_turns(&turns);
        }

        let report = Report {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id: meeting_id.to_string(),
            summary,
            created_at: chrono::Utc::now(),
        };
        match self.store.insert_report(report.clone()).await {
            Ok(()) => {
                info!(meeting_id, "report generated");
                Ok(report)
            }
            // Lost a race with a concurrent generation; theirs wins.
            Err(StoreError::DuplicateReport(_)) => {
                let existing = self.store.report(meeting_id).await?;
                existing.ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn report_if_any(&self, meeting_id: &str) -> Result<Option<Report>, EngineError> {
        Ok(self.store.report(meeting_id).await?)
    }
}
