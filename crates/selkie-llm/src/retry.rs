//! Bounded retry with exponential backoff
//!
//! LLM calls are wrapped in this policy; tool executions are not (tool
//! errors go back to the model as observations instead).

use selkie_core::{Error, Result, AGENT_LLM_RETRY_BASE_DELAY_MS, AGENT_LLM_RETRY_COUNT_DEFAULT};
use std::future::Future;
use std::time::Duration;

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, initial try included
    pub attempts_max: u32,
    /// Base delay, doubled per attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_max: AGENT_LLM_RETRY_COUNT_DEFAULT,
            base_delay: Duration::from_millis(AGENT_LLM_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting, for tests
    pub fn immediate(attempts_max: u32) -> Self {
        Self {
            attempts_max,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before the given retry (1-based attempt index)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `operation` under the policy
///
/// Non-retriable errors abort immediately; retriable ones are retried with
/// exponential backoff until the attempt budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    assert!(policy.attempts_max > 0, "attempts_max must be positive");

    let mut last_error = None;
    for attempt in 1..=policy.attempts_max {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retriable() => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "retriable operation failed");
                last_error = Some(e);
                if attempt < policy.attempts_max {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::internal("retry loop with zero attempts")))
}
