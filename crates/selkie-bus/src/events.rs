//! Bus message families

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message received from a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// Channel name (telegram, discord, cli…)
    pub channel: String,
    /// Sender id within the channel
    pub sender_id: String,
    /// Chat or conversation id within the channel
    pub chat_id: String,
    /// Message text
    pub content: String,
    /// When the message arrived
    pub timestamp: DateTime<Utc>,
    /// Media attachment URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
    /// Channel-specific metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// A message to send out through a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    /// Target channel
    pub channel: String,
    /// Target chat id
    pub chat_id: String,
    /// Message text
    pub content: String,
    /// Message id being replied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Media attachment URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<String>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            media: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_serde_skips_empty_fields() {
        let message = InboundMessage::new("tg", "alice", "42", "hi");
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("media"));
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_outbound_roundtrip() {
        let message = OutboundMessage::new("tg", "42", "reply text");
        let json = serde_json::to_string(&message).unwrap();
        let parsed: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, parsed);
    }
}
