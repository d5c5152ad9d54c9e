//! Working memory: a token-budgeted view over the current conversation
//!
//! Never persisted; rebuilt from the session and long-term memory each turn.
//! When adding a message would exceed the budget, older non-system messages
//! are folded into a summary before the new message is admitted, so the
//! window never exceeds `max_tokens`.

use selkie_core::{MEMORY_COMPRESSION_KEEP_RECENT_COUNT, MEMORY_WORKING_TOKENS_MAX_DEFAULT};
use serde::{Deserialize, Serialize};

/// Token estimate per CJK character
const TOKENS_PER_CJK_CHAR: f64 = 0.5;

/// Token estimate per non-CJK character
const TOKENS_PER_OTHER_CHAR: f64 = 0.25;

/// Estimate the token count of a text
///
/// Heuristic: CJK characters cost about half a token each, everything else
/// about a quarter. Non-empty text always counts at least one token.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let mut cjk = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            cjk += 1;
        } else {
            other += 1;
        }
    }

    let estimate = (cjk as f64 * TOKENS_PER_CJK_CHAR + other as f64 * TOKENS_PER_OTHER_CHAR) as u32;
    estimate.max(1)
}

/// Configuration for working memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemoryConfig {
    /// Token budget over all messages and pinned content
    pub max_tokens: u32,
    /// Non-system messages kept verbatim during compression
    pub keep_recent: usize,
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: MEMORY_WORKING_TOKENS_MAX_DEFAULT,
            keep_recent: MEMORY_COMPRESSION_KEEP_RECENT_COUNT,
        }
    }
}

/// One message inside the working window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingMessage {
    pub role: String,
    pub content: String,
}

impl WorkingMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    fn tokens(&self) -> u32 {
        estimate_tokens(&self.content)
    }
}

/// Token-budgeted working memory
#[derive(Debug, Clone)]
pub struct WorkingMemory {
    config: WorkingMemoryConfig,
    /// Identity and preferences; highest priority, never compressed away
    identity: String,
    /// Pinned facts, one per line
    facts: Vec<String>,
    /// Summary of compressed-away history
    summary: String,
    /// The live message window
    messages: Vec<WorkingMessage>,
    /// Number of compression passes performed (observability)
    compressions: u64,
}

impl WorkingMemory {
    /// Create with the given configuration
    pub fn new(config: WorkingMemoryConfig) -> Self {
        assert!(config.max_tokens > 0, "token budget must be positive");
        Self {
            config,
            identity: String::new(),
            facts: Vec::new(),
            summary: String::new(),
            messages: Vec::new(),
            compressions: 0,
        }
    }

    /// Create with defaults
    pub fn with_defaults() -> Self {
        Self::new(WorkingMemoryConfig::default())
    }

    /// Set the identity block
    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = identity.into();
    }

    /// Pin a fact
    pub fn pin_fact(&mut self, fact: impl Into<String>) {
        let fact = fact.into();
        if !self.facts.contains(&fact) {
            self.facts.push(fact);
        }
    }

    /// Add a message, compressing first if it would blow the budget
    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        let message = WorkingMessage::new(role, content);
        let incoming = message.tokens();

        // Admit only when the result stays within budget; a window exactly at
        // the budget is left untouched.
        if self.total_tokens() + incoming > self.config.max_tokens {
            self.compress();
        }
        self.messages.push(message);
    }

    /// Current token usage across messages, summary and pinned content
    pub fn total_tokens(&self) -> u32 {
        let message_tokens: u32 = self.messages.iter().map(|m| m.tokens()).sum();
        message_tokens
            + estimate_tokens(&self.summary)
            + estimate_tokens(&self.identity)
            + self.facts.iter().map(|f| estimate_tokens(f)).sum::<u32>()
    }

    /// Number of compression passes so far
    pub fn compression_count(&self) -> u64 {
        self.compressions
    }

    /// Messages currently in the window
    pub fn messages(&self) -> &[WorkingMessage] {
        &self.messages
    }

    /// Summary of compressed history, empty if none
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Fold old non-system messages into the summary
    ///
    /// Keeps all system messages and the most recent `keep_recent` others;
    /// the remainder is reduced to topic tokens appended to the summary.
    fn compress(&mut self) {
        let system: Vec<WorkingMessage> = self
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .cloned()
            .collect();
        let other: Vec<WorkingMessage> = self
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .cloned()
            .collect();

        self.compressions += 1;

        if other.len() <= self.config.keep_recent {
            // Nothing old enough to summarize; drop the oldest non-system
            // message instead so the budget can still be met.
            let mut other = other;
            if !other.is_empty() {
                other.remove(0);
            }
            self.messages = system.into_iter().chain(other).collect();
            return;
        }

        let split = other.len() - self.config.keep_recent;
        let (old, recent) = other.split_at(split);

        let folded = summarize_topics(old);
        if !folded.is_empty() {
            if self.summary.is_empty() {
                self.summary = folded;
            } else {
                self.summary = format!("{}; {}", self.summary, folded);
            }
        }

        self.messages = system.into_iter().chain(recent.iter().cloned()).collect();
        tracing::debug!(
            kept = self.messages.len(),
            summary_chars = self.summary.len(),
            "compressed working memory"
        );
    }

    /// Render the full working-memory context for prompt injection
    pub fn render_context(&self) -> String {
        let mut sections = Vec::new();

        if !self.identity.is_empty() {
            sections.push(format!("[Identity]\n{}", self.identity));
        }
        if !self.summary.is_empty() {
            sections.push(format!("[Earlier conversation]\n{}", self.summary));
        }
        if !self.facts.is_empty() {
            let facts = self
                .facts
                .iter()
                .map(|f| format!("- {}", f))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("[Pinned facts]\n{}", facts));
        }

        sections.join("\n\n")
    }

    /// Drop conversation state, keeping identity and pinned facts
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.summary.clear();
    }
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Reduce messages to a compact topic summary
///
/// Picks the most frequent content words (length > 3, deduplicated) across
/// the folded messages.
fn summarize_topics(messages: &[WorkingMessage]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut topics = Vec::new();

    for message in messages {
        for word in message.content.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if word.len() > 3 && seen.insert(word.clone()) {
                topics.push(word);
            }
            if topics.len() >= 8 {
                break;
            }
        }
        if topics.len() >= 8 {
            break;
        }
    }

    if topics.is_empty() {
        format!("{} earlier messages", messages.len())
    } else {
        format!("earlier discussion touched: {}", topics.join(", "))
    }
}
