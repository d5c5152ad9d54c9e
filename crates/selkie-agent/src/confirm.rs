//! Confirmation gate for destructive tools
//!
//! When the model proposes a tool marked `needs_confirmation`, the call is
//! stashed here and the user is asked. The next input is matched against a
//! small multilingual lexeme set; anything that is not a recognized confirm
//! or cancel goes back through the model, which is the intended conservative
//! behaviour. Pending confirmations expire after a fixed TTL and are
//! consumed exactly once.

use chrono::{DateTime, Utc};
use selkie_core::AGENT_CONFIRMATION_TTL_MS;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Confirmation lexemes (lowercase, trimmed, whole-input match)
const CONFIRM_LEXEMES: &[&str] = &["yes", "是", "确认", "ok", "go", "confirm", "确定", "好的"];

/// Cancellation lexemes
const CANCEL_LEXEMES: &[&str] = &["no", "取消", "cancel", "stop", "算了", "否"];

/// How a user input relates to a pending confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexeme {
    Confirm,
    Cancel,
    Other,
}

/// Classify an input against the lexeme sets
pub fn classify(input: &str) -> Lexeme {
    let normalized = input.trim().to_lowercase();
    if CONFIRM_LEXEMES.contains(&normalized.as_str()) {
        Lexeme::Confirm
    } else if CANCEL_LEXEMES.contains(&normalized.as_str()) {
        Lexeme::Cancel
    } else {
        Lexeme::Other
    }
}

/// A stashed destructive tool call awaiting user confirmation
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub session_key: String,
    pub tool_name: String,
    pub arguments: Value,
    pub created_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn new(session_key: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            session_key: session_key.into(),
            tool_name: tool_name.into(),
            arguments,
            created_at: Utc::now(),
        }
    }

    /// Whether the TTL has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > chrono::Duration::milliseconds(AGENT_CONFIRMATION_TTL_MS as i64)
    }
}

/// Pending confirmations keyed by session
#[derive(Debug, Default)]
pub struct ConfirmationStore {
    pending: Mutex<HashMap<String, PendingConfirmation>>,
}

impl ConfirmationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash a confirmation, replacing any previous one for the session
    pub async fn put(&self, confirmation: PendingConfirmation) {
        let mut pending = self.pending.lock().await;
        pending.insert(confirmation.session_key.clone(), confirmation);
    }

    /// Take the pending confirmation for a session, if fresh
    ///
    /// Consumes it either way; an expired entry returns None. A second take
    /// for the same session returns None until a new confirmation is put.
    pub async fn take(&self, session_key: &str) -> Option<PendingConfirmation> {
        let mut pending = self.pending.lock().await;
        let confirmation = pending.remove(session_key)?;
        if confirmation.is_expired(Utc::now()) {
            tracing::debug!(session = session_key, "pending confirmation expired");
            return None;
        }
        Some(confirmation)
    }

    /// Whether a session has a live pending confirmation
    ///
    /// Expired entries are dropped on inspection.
    pub async fn has_pending(&self, session_key: &str) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.get(session_key) {
            None => false,
            Some(confirmation) if confirmation.is_expired(Utc::now()) => {
                pending.remove(session_key);
                false
            }
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_confirm_lexemes() {
        for input in ["yes", "YES", " ok ", "confirm", "是", "确认", "好的"] {
            assert_eq!(classify(input), Lexeme::Confirm, "input: {}", input);
        }
    }

    #[test]
    fn test_classify_cancel_lexemes() {
        for input in ["no", "No", "cancel", "stop", "取消", "算了"] {
            assert_eq!(classify(input), Lexeme::Cancel, "input: {}", input);
        }
    }

    #[test]
    fn test_classify_other() {
        for input in ["yes please", "okay then", "delete everything", ""] {
            assert_eq!(classify(input), Lexeme::Other, "input: {}", input);
        }
    }

    #[tokio::test]
    async fn test_put_take_consumes_once() {
        let store = ConfirmationStore::new();
        store
            .put(PendingConfirmation::new("k", "delete_tasks", json!({})))
            .await;

        assert!(store.has_pending("k").await);
        assert!(store.take("k").await.is_some());
        assert!(store.take("k").await.is_none(), "consumed exactly once");
        assert!(!store.has_pending("k").await);
    }

    #[tokio::test]
    async fn test_expired_confirmation_is_dropped() {
        let store = ConfirmationStore::new();
        let mut confirmation = PendingConfirmation::new("k", "delete_tasks", json!({}));
        confirmation.created_at = Utc::now() - chrono::Duration::minutes(10);
        store.put(confirmation).await;

        assert!(!store.has_pending("k").await);
        assert!(store.take("k").await.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_previous() {
        let store = ConfirmationStore::new();
        store
            .put(PendingConfirmation::new("k", "first", json!({})))
            .await;
        store
            .put(PendingConfirmation::new("k", "second", json!({})))
            .await;

        let taken = store.take("k").await.unwrap();
        assert_eq!(taken.tool_name, "second");
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = ConfirmationStore::new();
        store
            .put(PendingConfirmation::new("a", "delete_tasks", json!({})))
            .await;
        assert!(!store.has_pending("b").await);
        assert!(store.has_pending("a").await);
    }
}
