//! Provider quota enforcement
//!
//! One limiter per consumer identity. Jobs are handed to a background worker
//! over a channel and held in a priority queue; the worker admits them as
//! request, token, and daily budgets allow, with a minimum spacing between
//! admissions. Execution is strictly serial: the worker drives each admitted
//! job to completion (retries included) before admitting the next, and
//! delivers the result back through a oneshot, so queue entries never carry
//! caller callbacks and at most one call is ever in flight per identity.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which budget pool a call draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerIdentity {
    Moderator,
    Participant,
}

impl ConsumerIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerIdentity::Moderator => "moderator",
            ConsumerIdentity::Participant => "participant",
        }
    }
}

/// Per-identity budget configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
    pub requests_per_day: u32,
    /// Minimum gap between admitted calls, on top of the windowed budgets.
    pub min_spacing_ms: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 15,
            tokens_per_minute: 1_000_000,
            requests_per_day: 1_500,
            min_spacing_ms: 4_000,
        }
    }
}

/// Point-in-time view of a limiter, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterStatus {
    pub requests_remaining: u32,
    pub tokens_remaining: i64,
    pub daily_remaining: u32,
    pub queued: usize,
}

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("rate limiter worker stopped")]
    WorkerGone,
}

type BoxedJob = BoxFuture<'static, ()>;

struct QueuedJob {
    priority: u8,
    seq: u64,
    estimated_tokens: u32,
    run: BoxedJob,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Reversed so the max-heap pops the lowest (priority, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum Command {
    Enqueue(QueuedJob),
    Reconcile { estimated: u32, actual: u32 },
    Status(oneshot::Sender<LimiterStatus>),
}

/// Handle to a budget worker. Cloning shares the same budgets and queue.
#[derive(Clone)]
pub struct RateLimiter {
    identity: ConsumerIdentity,
    tx: mpsc::Sender<Command>,
    seq: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl RateLimiter {
    pub fn new(identity: ConsumerIdentity, limits: RateLimits) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let worker = Worker::new(identity, limits, rx);
        tokio::spawn(worker.run());
        Self {
            identity,
            tx,
            seq: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    pub fn identity(&self) -> ConsumerIdentity {
        self.identity
    }

    /// Submit a call for admission. Completes with the call's result once the
    /// worker has admitted and run it; lower `priority` values run first,
    /// ties in arrival order.
    pub async fn schedule<T, F, Fut>(
        &self,
        priority: u8,
        estimated_tokens: u32,
        op: F,
    ) -> Result<T, RateLimitError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let run: BoxedJob = Box::pin(async move {
            let _ = done_tx.send(op().await);
        });
        let job = QueuedJob {
            priority,
            seq: self
                .seq
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst),
            estimated_tokens,
            run,
        };
        self.tx
            .send(Command::Enqueue(job))
            .await
            .map_err(|_| RateLimitError::WorkerGone)?;
        done_rx.await.map_err(|_| RateLimitError::WorkerGone)
    }

    /// Correct the token budget once actual usage is known.
    pub async fn reconcile(&self, estimated: u32, actual: u32) {
        let _ = self.tx.send(Command::Reconcile { estimated, actual }).await;
    }

    pub async fn status(&self) -> Result<LimiterStatus, RateLimitError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Status(tx))
            .await
            .map_err(|_| RateLimitError::WorkerGone)?;
        rx.await.map_err(|_| RateLimitError::WorkerGone)
    }
}

struct Worker {
    identity: ConsumerIdentity,
    limits: RateLimits,
    rx: mpsc::Receiver<Command>,
    queue: BinaryHeap<QueuedJob>,
    requests_remaining: u32,
    tokens_remaining: i64,
    daily_remaining: u32,
    last_admitted: Option<Instant>,
    daily_warned: bool,
}

impl Worker {
    fn new(identity: ConsumerIdentity, limits: RateLimits, rx: mpsc::Receiver<Command>) -> Self {
        Self {
            identity,
            limits,
            rx,
            queue: BinaryHeap::new(),
            requests_remaining: limits.requests_per_minute,
            tokens_remaining: limits.tokens_per_minute as i64,
            daily_remaining: limits.requests_per_day,
            last_admitted: None,
            daily_warned: false,
        }
    }

    async fn run(mut self) {
        let start = Instant::now();
        let mut minute = tokio::time::interval_at(
            start + Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let mut daily_reset = start + Duration::from_secs(24 * 60 * 60);
        // At most one job runs at a time; the next is admitted only after
        // this one completes and the spacing gap from its start has passed.
        let mut in_flight: Option<BoxedJob> = None;
        loop {
            if in_flight.is_none() {
                in_flight = self.admit_one();
            }
            let job_running = in_flight.is_some();
            let spacing_wake = if job_running {
                None
            } else {
                self.spacing_wake()
            };
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Enqueue(job)) => {
                        // A job larger than the full window would never run.
                        let capped = job
                            .estimated_tokens
                            .min(self.limits.tokens_per_minute);
                        self.queue.push(QueuedJob {
                            estimated_tokens: capped,
                            ..job
                        });
                    }
                    Some(Command::Reconcile { estimated, actual }) => {
                        self.tokens_remaining += estimated as i64 - actual as i64;
                        debug!(
                            identity = self.identity.as_str(),
                            estimated,
                            actual,
                            tokens_remaining = self.tokens_remaining,
                            "reconciled token budget"
                        );
                    }
                    Some(Command::Status(reply)) => {
                        let _ = reply.send(LimiterStatus {
                            requests_remaining: self.requests_remaining,
                            tokens_remaining: self.tokens_remaining,
                            daily_remaining: self.daily_remaining,
                            queued: self.queue.len(),
                        });
                    }
                    None => break,
                },
                _ = minute.tick() => {
                    self.requests_remaining = self.limits.requests_per_minute;
                    self.tokens_remaining = self.limits.tokens_per_minute as i64;
                }
                _ = tokio::time::sleep_until(daily_reset) => {
                    self.daily_remaining = self.limits.requests_per_day;
                    self.daily_warned = false;
                    daily_reset += Duration::from_secs(24 * 60 * 60);
                    info!(identity = self.identity.as_str(), "daily request budget reset");
                }
                _ = Self::run_option(&mut in_flight), if job_running => {
                    in_flight = None;
                }
                _ = Self::sleep_option(spacing_wake), if spacing_wake.is_some() => {}
            }
        }
    }

    async fn run_option(job: &mut Option<BoxedJob>) {
        match job {
            Some(run) => run.as_mut().await,
            None => std::future::pending().await,
        }
    }

    async fn sleep_option(deadline: Option<Instant>) {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    /// Wake time when the head job is blocked only on minimum spacing.
    fn spacing_wake(&self) -> Option<Instant> {
        let head = self.queue.peek()?;
        if self.requests_remaining == 0
            || self.daily_remaining == 0
            || self.tokens_remaining < head.estimated_tokens as i64
        {
            return None;
        }
        let last = self.last_admitted?;
        let ready_at = last + Duration::from_millis(self.limits.min_spacing_ms);
        (ready_at > Instant::now()).then_some(ready_at)
    }

    /// Pop the head job if every budget allows it right now.
    fn admit_one(&mut self) -> Option<BoxedJob> {
        let head = self.queue.peek()?;
        if self.daily_remaining == 0 {
            if !self.daily_warned {
                warn!(
                    identity = self.identity.as_str(),
                    queued = self.queue.len(),
                    "daily request budget exhausted, holding queue until reset"
                );
                self.daily_warned = true;
            }
            return None;
        }
        if self.requests_remaining == 0
            || self.tokens_remaining < head.estimated_tokens as i64
        {
            return None;
        }
        if let Some(last) = self.last_admitted {
            let gap = Duration::from_millis(self.limits.min_spacing_ms);
            if Instant::now() < last + gap {
                return None;
            }
        }
        let job = self.queue.pop()?;
        self.requests_remaining -= 1;
        self.daily_remaining -= 1;
        self.tokens_remaining -= job.estimated_tokens as i64;
        self.last_admitted = Some(Instant::now());
        debug!(
            identity = self.identity.as_str(),
            priority = job.priority,
            estimated_tokens = job.estimated_tokens,
            requests_remaining = self.requests_remaining,
            "admitted call"
        );
        Some(job.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    fn no_spacing(rpm: u32) -> RateLimits {
        RateLimits {
            requests_per_minute: rpm,
            tokens_per_minute: 1_000_000,
            requests_per_day: 10_000,
            min_spacing_ms: 0,
        }
    }

    async fn settle() {
        for _ in 0..40 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn holds_request_over_minute_budget_until_refill() {
        let limiter = RateLimiter::new(ConsumerIdentity::Moderator, no_spacing(3));
        let completed = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            let completed = Arc::clone(&completed);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(2, 100, move || async move {
                        completed.fetch_add(1, AtomicOrdering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        settle().await;
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 4);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lower_priority_value_runs_first() {
        let limits = RateLimits {
            min_spacing_ms: 4_000,
            ..no_spacing(100)
        };
        let limiter = RateLimiter::new(ConsumerIdentity::Participant, limits);
        let order = Arc::new(Mutex::new(Vec::new()));

        // First job admitted immediately; the next two queue behind spacing.
        let first = {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                limiter
                    .schedule(2, 10, move || async move {
                        order.lock().unwrap().push("first");
                    })
                    .await
                    .unwrap();
            })
        };
        settle().await;

        let low = {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                limiter
                    .schedule(3, 10, move || async move {
                        order.lock().unwrap().push("low");
                    })
                    .await
                    .unwrap();
            })
        };
        settle().await;
        let urgent = {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                limiter
                    .schedule(0, 10, move || async move {
                        order.lock().unwrap().push("urgent");
                    })
                    .await
                    .unwrap();
            })
        };
        settle().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        for handle in [first, low, urgent] {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "urgent", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_blocks_the_next_admission_past_the_spacing_gap() {
        let limits = RateLimits {
            min_spacing_ms: 4_000,
            ..no_spacing(100)
        };
        let limiter = RateLimiter::new(ConsumerIdentity::Participant, limits);
        let starts = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let limiter = limiter.clone();
            let starts = Arc::clone(&starts);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(2, 10, move || async move {
                        starts.lock().unwrap().push(Instant::now());
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    })
                    .await
                    .unwrap();
            }));
        }
        settle().await;

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        for handle in handles {
            handle.await.unwrap();
        }

        // The second call may not start until the first returns, even though
        // the 4s spacing gap elapsed long before.
        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 2);
        assert!(starts[1] - starts[0] >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_returns_unused_tokens() {
        let limits = RateLimits {
            requests_per_minute: 100,
            tokens_per_minute: 1_000,
            requests_per_day: 10_000,
            min_spacing_ms: 0,
        };
        let limiter = RateLimiter::new(ConsumerIdentity::Moderator, limits);
        limiter.schedule(2, 800, || async {}).await.unwrap();
        limiter.reconcile(800, 100).await;
        settle().await;

        let completed = Arc::new(AtomicU32::new(0));
        let second = {
            let limiter = limiter.clone();
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                limiter
                    .schedule(2, 800, move || async move {
                        completed.fetch_add(1, AtomicOrdering::SeqCst);
                    })
                    .await
                    .unwrap();
            })
        };
        settle().await;
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 1);
        second.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn daily_exhaustion_blocks_until_next_day() {
        let limits = RateLimits {
            requests_per_minute: 100,
            tokens_per_minute: 1_000_000,
            requests_per_day: 1,
            min_spacing_ms: 0,
        };
        let limiter = RateLimiter::new(ConsumerIdentity::Participant, limits);
        let completed = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let limiter = limiter.clone();
            let completed = Arc::clone(&completed);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(2, 10, move || async move {
                        completed.fetch_add(1, AtomicOrdering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        settle().await;
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
        settle().await;
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 2);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_budgets_and_queue_depth() {
        let limiter = RateLimiter::new(ConsumerIdentity::Moderator, no_spacing(10));
        limiter.schedule(2, 500, || async {}).await.unwrap();
        settle().await;
        let status = limiter.status().await.unwrap();
        assert_eq!(status.requests_remaining, 9);
        assert_eq!(status.tokens_remaining, 1_000_000 - 500);
        assert_eq!(status.queued, 0);
    }
}
