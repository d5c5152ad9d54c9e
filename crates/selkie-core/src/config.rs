//! Configuration for Selkie
//!
//! Explicit defaults, environment loading, validation.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the Selkie process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelkieConfig {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Delivery queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Root directory for all persisted state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for SelkieConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            queue: QueueConfig::default(),
            memory: MemoryConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl SelkieConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `DATA_DIR`, `GATEWAY_HOST`, `GATEWAY_PORT`, `GATEWAY_AUTH_TOKEN`,
    /// `GATEWAY_MAX_CONNECTIONS`, `MEMORY_WORKING_TOKENS_MAX` and
    /// `MEMORY_RECALL_SCORE_MIN`, falling back to defaults for anything
    /// unset. LLM and embedding variables are read by their own crates.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(host) = std::env::var("GATEWAY_HOST") {
            if !host.is_empty() {
                config.gateway.host = host;
            }
        }
        if let Ok(port) = std::env::var("GATEWAY_PORT") {
            if let Ok(port) = port.parse() {
                config.gateway.port = port;
            }
        }
        if let Ok(token) = std::env::var("GATEWAY_AUTH_TOKEN") {
            if !token.is_empty() {
                config.gateway.auth_token = Some(token);
            }
        }
        if let Ok(max) = std::env::var("GATEWAY_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.gateway.connections_max = max;
            }
        }
        if let Ok(tokens) = std::env::var("MEMORY_WORKING_TOKENS_MAX") {
            if let Ok(tokens) = tokens.parse() {
                config.memory.working_tokens_max = tokens;
            }
        }
        if let Ok(floor) = std::env::var("MEMORY_RECALL_SCORE_MIN") {
            if let Ok(floor) = floor.parse() {
                config.memory.recall_score_min = floor;
            }
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.gateway.validate()?;
        self.agent.validate()?;
        self.queue.validate()?;
        self.memory.validate()?;
        Ok(())
    }

    /// Directory for session state
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Directory for the delivery queue
    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("delivery-queue")
    }

    /// Directory for memory stores
    pub fn memories_dir(&self) -> PathBuf {
        self.data_dir.join("memories")
    }

    /// Path of the builtin task store
    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required for authenticated methods (None disables auth)
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Maximum concurrent WebSocket connections
    #[serde(default = "default_connections_max")]
    pub connections_max: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connections_max() -> usize {
    GATEWAY_CONNECTIONS_COUNT_DEFAULT
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_token: None,
            connections_max: default_connections_max(),
        }
    }
}

impl GatewayConfig {
    fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidConfiguration {
                field: "gateway.host".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.connections_max == 0 {
            return Err(Error::InvalidConfiguration {
                field: "gateway.connections_max".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Bind address in host:port form
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-loop iterations per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// LLM call attempts before giving up
    #[serde(default = "default_llm_retries")]
    pub llm_retries: u32,

    /// Hard timeout for one LLM call (milliseconds)
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,
}

fn default_max_steps() -> u32 {
    AGENT_STEPS_COUNT_MAX_DEFAULT
}

fn default_llm_retries() -> u32 {
    AGENT_LLM_RETRY_COUNT_DEFAULT
}

fn default_llm_timeout_ms() -> u64 {
    AGENT_LLM_TIMEOUT_MS_DEFAULT
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            llm_retries: default_llm_retries(),
            llm_timeout_ms: default_llm_timeout_ms(),
        }
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::InvalidConfiguration {
                field: "agent.max_steps".into(),
                reason: "must be positive".into(),
            });
        }
        if self.llm_retries == 0 {
            return Err(Error::InvalidConfiguration {
                field: "agent.llm_retries".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Delivery queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Worker scan interval (milliseconds)
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Retries before a delivery is dead-lettered
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_scan_interval_ms() -> u64 {
    QUEUE_SCAN_INTERVAL_MS_DEFAULT
}

fn default_max_retries() -> u32 {
    QUEUE_RETRIES_COUNT_MAX_DEFAULT
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl QueueConfig {
    fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 {
            return Err(Error::InvalidConfiguration {
                field: "queue.scan_interval_ms".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Working memory token budget
    #[serde(default = "default_working_tokens_max")]
    pub working_tokens_max: u32,

    /// Minimum fused score for recall results
    #[serde(default = "default_recall_score_min")]
    pub recall_score_min: f32,
}

fn default_working_tokens_max() -> u32 {
    MEMORY_WORKING_TOKENS_MAX_DEFAULT
}

fn default_recall_score_min() -> f32 {
    0.05
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_tokens_max: default_working_tokens_max(),
            recall_score_min: default_recall_score_min(),
        }
    }
}

impl MemoryConfig {
    fn validate(&self) -> Result<()> {
        if self.working_tokens_max == 0 {
            return Err(Error::InvalidConfiguration {
                field: "memory.working_tokens_max".into(),
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.recall_score_min) {
            return Err(Error::InvalidConfiguration {
                field: "memory.recall_score_min".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        Ok(())
    }
}
