//! Retry with bounded exponential backoff
//!
//! Wraps a fallible model call. Only errors the model boundary classifies
//! as retryable are attempted again; a provider-supplied retry hint takes
//! precedence over the computed backoff.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::ports::model_client::ModelError;

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 means up to 4 attempts total)
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 120_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (0-based).
    ///
    /// A provider hint is honored as-is (capped); otherwise exponential
    /// backoff with ±20% jitter, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let cap = Duration::from_millis(self.max_delay_ms);
        if let Some(hint) = hint {
            return hint.min(cap);
        }
        let exponential =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let jitter = exponential * 0.2 * (rand::thread_rng().gen::<f64>() - 0.5);
        Duration::from_millis((exponential + jitter) as u64).min(cap)
    }
}

/// Execute `operation` with retry logic.
///
/// Fatal errors and retry-budget exhaustion re-raise the last error with
/// its original classification. Every attempt and retry decision is logged;
/// nothing else is mutated.
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    error!(
                        operation = operation_name,
                        error = %err,
                        "failed with non-retryable error"
                    );
                    return Err(err);
                }
                if attempt >= policy.max_retries {
                    error!(
                        operation = operation_name,
                        retries = attempt,
                        error = %err,
                        "retry budget exhausted"
                    );
                    return Err(err);
                }
                let delay = policy.delay_for(attempt, err.retry_hint());
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    total = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
