//! Delivery queue types

use chrono::{DateTime, Utc};
use selkie_core::{QUEUE_BACKOFF_SCHEDULE_MS, QUEUE_RETRIES_COUNT_MAX_DEFAULT};
use serde::{Deserialize, Serialize};

/// One outbound message awaiting delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedDelivery {
    /// Delivery id; doubles as the file stem
    pub id: String,
    /// Target channel name
    pub channel: String,
    /// Channel-specific recipient (chat id, user id…)
    pub to: String,
    /// Message text
    pub text: String,
    /// Originating agent
    pub agent_id: String,
    /// Originating session
    pub session_key: String,
    /// Attempts made so far
    pub retry_count: u32,
    /// Attempts before dead-lettering
    pub max_retries: u32,
    /// Error from the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the delivery was enqueued
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time of the next attempt
    pub next_retry_at: DateTime<Utc>,
}

impl QueuedDelivery {
    /// Create a new delivery ready for immediate attempt
    pub fn new(
        channel: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        agent_id: impl Into<String>,
        session_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.into(),
            to: to.into(),
            text: text.into(),
            agent_id: agent_id.into(),
            session_key: session_key.into(),
            retry_count: 0,
            max_retries: QUEUE_RETRIES_COUNT_MAX_DEFAULT,
            last_error: None,
            enqueued_at: now,
            next_retry_at: now,
        }
    }

    /// Whether the delivery is due for an attempt
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at <= now
    }

    /// Whether the retry budget is exhausted
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Record a failed attempt and schedule the next one
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.next_retry_at = Utc::now() + chrono::Duration::milliseconds(
            backoff_delay(self.retry_count) as i64,
        );
    }
}

/// Result of one send attempt, as reported by a channel sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered; the file is removed
    Delivered,
    /// Transient failure; retried after backoff
    Retry(String),
    /// Permanent failure (payload rejected); dead-lettered immediately
    Fatal(String),
}

/// Backoff delay in milliseconds before retry `n` (1-based), clamped at the
/// last schedule step
pub fn backoff_delay(retry_count: u32) -> u64 {
    assert!(retry_count > 0, "retry_count is 1-based");
    let index = (retry_count as usize - 1).min(QUEUE_BACKOFF_SCHEDULE_MS.len() - 1);
    QUEUE_BACKOFF_SCHEDULE_MS[index]
}
