//! Lifecycle driver
//!
//! The background loop that keeps running meetings moving: one turn per
//! meeting per tick, a conclusion check when the turn did not already
//! conclude, and report generation once a meeting completes. One meeting's
//! failure never stalls the others.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use roundtable_domain::{Mcp, MeetingStatus};

use crate::ports::store::MeetingStore;
use crate::use_cases::report::ReportService;
use crate::use_cases::turn::{TurnEngine, TurnOutcome};
use crate::use_cases::EngineError;

pub struct LifecycleDriver {
    store: Arc<dyn MeetingStore>,
    engine: Arc<TurnEngine>,
    reports: Arc<ReportService>,
}

impl LifecycleDriver {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        engine: Arc<TurnEngine>,
        reports: Arc<ReportService>,
    ) -> Self {
        Self {
            store,
            engine,
            reports,
        }
    }

    /// Tick until the token is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let period = Duration::from_millis(self.engine.params().tick_interval_ms);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(period_ms = period.as_millis() as u64, "lifecycle driver started");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("lifecycle driver stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.tick().await {
                error!(error = %err, "driver tick failed");
            }
        }
    }

    /// Advance every running meeting by one turn.
    pub async fn tick(&self) -> Result<(), EngineError> {
        let running = self
            .store
            .meetings_with_status(MeetingStatus::Running)
            .await?;
        for meeting in running {
            if let Err(err) = self.advance(&meeting.id).await {
                error!(meeting_id = %meeting.id, error = %err, "meeting cycle failed");
            }
        }
        Ok(())
    }

    /// One full cycle for one meeting: turn, conclusion check, report.
    async fn advance(&self, meeting_id: &str) -> Result<(), EngineError> {
        let outcome = self.engine.run_turn(meeting_id).await?;
        debug!(meeting_id, ?outcome, "turn cycle outcome");

        match outcome {
            TurnOutcome::Concluded { .. } => {
                self.reports.generate_report(meeting_id).await?;
            }
            TurnOutcome::Spoke { .. } | TurnOutcome::Skipped { .. } => {
                // The meeting may have been paused or cancelled by an
                // operator while the turn ran.
                let meeting = self.store.meeting(meeting_id).await?;
                if meeting.status != MeetingStatus::Running {
                    return Ok(());
                }
                let turns = self.store.turns(meeting_id).await?;
                let moderator = self
                    .store
                    .personas(meeting_id)
                    .await?
                    .into_iter()
                    .find(|p| p.is_moderator())
                    .map(|p| p.mcp)
                    .unwrap_or_else(Mcp::moderator);
                let check = self
                    .engine
                    .gateway()
                    .check_conclusion(&moderator, &meeting.whiteboard, &turns)
                    .await?;
                if check.conclude {
                    let reason = if check.reason.is_empty() {
                        "Objectives met".to_string()
                    } else {
                        check.reason
                    };
                    self.engine.conclude(meeting_id, &reason).await?;
                    self.reports.generate_report(meeting_id).await?;
                }
            }
            TurnOutcome::Busy
            | TurnOutcome::NotRunning
            | TurnOutcome::Waiting
            | TurnOutcome::Paused { .. } => {}
        }
        Ok(())
    }
}
