//! Canonical session key grammar
//!
//! ```text
//! sessionKey ::= "agent:" agentId ":" ( "main"
//!                                     | channel
//!                                     | "direct:" peerId
//!                                     | channel ":" peerId
//!                                     | channel ":direct:" peerId )
//! ```
//!
//! All accepted forms normalize to the same `(agent_id, channel, peer_id)`
//! triple. The shared form `agent:<id>:main` uses channel `main` with peer
//! `user`.

use selkie_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default channel for the legacy `direct:` form
const CHANNEL_DEFAULT: &str = "cli";

/// Default peer when the key omits one
const PEER_DEFAULT: &str = "user";

/// A parsed, canonical session key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub agent_id: String,
    pub channel: String,
    pub peer_id: String,
}

impl SessionKey {
    /// Build a key from its parts
    pub fn new(
        agent_id: impl Into<String>,
        channel: impl Into<String>,
        peer_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            channel: channel.into(),
            peer_id: peer_id.into(),
        }
    }

    /// The shared session for an agent
    pub fn main(agent_id: impl Into<String>) -> Self {
        Self::new(agent_id, "main", PEER_DEFAULT)
    }

    /// Parse any accepted form
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();

        if parts.first() != Some(&"agent") || parts.len() < 3 {
            return Err(Error::InvalidSessionKey {
                key: raw.to_string(),
                reason: "expected agent:<id>:<...>".to_string(),
            });
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidSessionKey {
                key: raw.to_string(),
                reason: "empty segment".to_string(),
            });
        }

        let agent_id = parts[1].to_string();
        let (channel, peer_id) = match parts.len() {
            // agent:<id>:main | agent:<id>:<channel>
            3 => (parts[2].to_string(), PEER_DEFAULT.to_string()),
            // agent:<id>:direct:<peer> | agent:<id>:<channel>:<peer>
            4 => {
                if parts[2] == "direct" {
                    (CHANNEL_DEFAULT.to_string(), parts[3].to_string())
                } else {
                    (parts[2].to_string(), parts[3].to_string())
                }
            }
            // agent:<id>:<channel>:direct:<peer>
            5 if parts[3] == "direct" => (parts[2].to_string(), parts[4].to_string()),
            _ => {
                return Err(Error::InvalidSessionKey {
                    key: raw.to_string(),
                    reason: "unrecognized form".to_string(),
                });
            }
        };

        Ok(Self {
            agent_id,
            channel,
            peer_id,
        })
    }

    /// Canonical string form
    pub fn canonical(&self) -> String {
        if self.channel == "main" {
            format!("agent:{}:main", self.agent_id)
        } else {
            format!("agent:{}:{}:{}", self.agent_id, self.channel, self.peer_id)
        }
    }

    /// Filesystem-safe form (colons replaced)
    pub fn sanitized(&self) -> String {
        self.canonical().replace(':', "_")
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
