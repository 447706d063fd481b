//! Shared retry policy for calls to the remote SIS.
//!
//! One policy object owns the retry decision (max attempts, backoff, which
//! error classes are retryable) so call sites don't grow their own ad hoc
//! loops.

use super::error::SyncError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay before the first retry (doubles each attempt).
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Calculates the delay before retry number `attempt` (1-based),
    /// with exponential backoff and 0-20% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base * 2u64.pow(attempt.saturating_sub(1).min(5));
        let capped = exponential.min(self.max_delay.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=(capped / 5).max(1));
        Duration::from_millis(capped + jitter)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is exhausted.
    pub async fn run<F, Fut, T>(&self, what: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = what,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(operation = what, attempt = attempt, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}
