//! Limit constants for Selkie
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Gateway Limits
// =============================================================================

/// Maximum size of one WebSocket frame in bytes (1 MiB)
pub const GATEWAY_FRAME_SIZE_BYTES_MAX: usize = 1024 * 1024;

/// Maximum length of a chat text input in characters
pub const GATEWAY_TEXT_LENGTH_CHARS_MAX: usize = 10_000;

/// Default maximum number of concurrent WebSocket connections
pub const GATEWAY_CONNECTIONS_COUNT_DEFAULT: usize = 1000;

/// WebSocket close code sent when the connection limit is exceeded
pub const GATEWAY_CLOSE_CODE_OVERLOADED: u16 = 1013;

// =============================================================================
// Agent Limits
// =============================================================================

/// Maximum iterations of the agent tool loop per turn
pub const AGENT_STEPS_COUNT_MAX_DEFAULT: u32 = 10;

/// LLM call attempts before surfacing an error (initial try included)
pub const AGENT_LLM_RETRY_COUNT_DEFAULT: u32 = 3;

/// Base delay for LLM retry backoff in milliseconds (1 sec)
pub const AGENT_LLM_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Hard timeout for a single LLM call in milliseconds (60 sec)
pub const AGENT_LLM_TIMEOUT_MS_DEFAULT: u64 = 60 * 1000;

/// Lifetime of a pending destructive-tool confirmation in milliseconds (5 min)
pub const AGENT_CONFIRMATION_TTL_MS: u64 = 5 * 60 * 1000;

/// Maximum characters of recalled memory injected into the system context
pub const AGENT_MEMORY_CONTEXT_CHARS_MAX: usize = 1500;

/// Number of long-term memories recalled per turn
pub const AGENT_MEMORY_RECALL_COUNT: usize = 5;

// =============================================================================
// Tool Limits
// =============================================================================

/// Default per-tool execution timeout in milliseconds (30 sec)
pub const TOOL_TIMEOUT_MS_DEFAULT: u64 = 30 * 1000;

/// Maximum number of tools in a registry
pub const TOOL_REGISTRY_COUNT_MAX: usize = 1000;

// =============================================================================
// Delivery Queue Limits
// =============================================================================

/// Default delivery retry limit before dead-lettering
pub const QUEUE_RETRIES_COUNT_MAX_DEFAULT: u32 = 5;

/// Worker scan interval in milliseconds (5 sec)
pub const QUEUE_SCAN_INTERVAL_MS_DEFAULT: u64 = 5 * 1000;

/// Retry backoff schedule in milliseconds; clamped at the last step
pub const QUEUE_BACKOFF_SCHEDULE_MS: [u64; 4] = [5_000, 25_000, 120_000, 600_000];

// =============================================================================
// Session Limits
// =============================================================================

/// Sessions idle longer than this many days are eligible for archiving
pub const SESSION_ARCHIVE_AGE_DAYS_DEFAULT: u32 = 30;

/// Recent messages loaded into the agent context per turn
pub const SESSION_CONTEXT_MESSAGES_COUNT: usize = 20;

// =============================================================================
// Memory Limits
// =============================================================================

/// Working memory token budget
pub const MEMORY_WORKING_TOKENS_MAX_DEFAULT: u32 = 8000;

/// Non-system messages kept verbatim when working memory compresses
pub const MEMORY_COMPRESSION_KEEP_RECENT_COUNT: usize = 5;

/// Recency decay time constant in hours for RIF scoring
pub const MEMORY_RECENCY_TAU_HOURS: f64 = 24.0;

/// Access count at which the frequency score saturates
pub const MEMORY_FREQUENCY_SATURATION_COUNT: u64 = 10;

/// Cosine similarity threshold for consolidation clustering
pub const MEMORY_CONSOLIDATION_SIMILARITY_MIN: f32 = 0.85;

/// Confidence multiplier applied to consolidated source entries
pub const MEMORY_CONSOLIDATION_DECAY: f32 = 0.7;

/// Entries below this confidence are candidates for forgetting
pub const MEMORY_FORGET_CONFIDENCE_MAX: f32 = 0.3;

/// Entries accessed at least this often are never forgotten
pub const MEMORY_FORGET_ACCESS_COUNT_MIN: u64 = 2;
