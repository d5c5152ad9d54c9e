//! Session data types

use crate::key::SessionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transcript line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SessionMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

/// Index line persisted in `sessions.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_key: String,
    pub agent_id: String,
    pub channel: String,
    pub peer_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A session: identity plus the buffer of messages not yet flushed to the
/// transcript
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Messages appended since the last save
    pub buffered: Vec<SessionMessage>,
}

impl Session {
    /// Create a fresh session for a key
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            created_at: now,
            updated_at: now,
            buffered: Vec::new(),
        }
    }

    /// Buffer a message; it reaches disk on the next save
    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.buffered.push(SessionMessage::new(role, content));
        self.updated_at = Utc::now();
    }

    /// Index line for this session
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_key: self.key.canonical(),
            agent_id: self.key.agent_id.clone(),
            channel: self.key.channel.clone(),
            peer_id: self.key.peer_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
