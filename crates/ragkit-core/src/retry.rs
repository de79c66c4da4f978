//! Resilient call wrapper: the single place where retry policy is defined.
//!
//! Every outbound call to the embedding, vector and generation backends goes
//! through [`ResilientCaller::execute`]. Transient failures (including a call
//! exceeding its timeout) are retried with exponential backoff; permanent
//! failures abort immediately.
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt.
    pub initial_delay: Duration,
    /// Upper bound for a single attempt. Exceeding it counts as transient.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_secs(1), call_timeout: Some(Duration::from_secs(30)) }
    }
}

impl RetryPolicy {
    /// Backoff slept after the failed attempt number `attempt` (1-based):
    /// `initial_delay * 2^(attempt - 1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResilientCaller {
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(policy: RetryPolicy) -> Self { Self { policy } }

    pub fn policy(&self) -> RetryPolicy { self.policy }

    /// Run `call` until it succeeds, fails permanently, or the attempt
    /// budget is spent. An exhausted budget surfaces the last failure
    /// wrapped in [`Error::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            let outcome = match self.policy.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Transient(format!("{operation} timed out after {}ms", limit.as_millis()))),
                },
                None => call().await,
            };
            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(operation, attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    warn!(operation, attempts = attempt, error = %err, "retries exhausted");
                    return Err(Error::RetriesExhausted { operation: operation.to_string(), attempts: attempt, source: Box::new(err) });
                }
                Err(err) => {
                    debug!(operation, attempt, error = %err, "permanent failure, not retrying");
                    return Err(err);
                }
            }
        }
    }
}
