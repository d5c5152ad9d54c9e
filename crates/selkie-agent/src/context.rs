//! Context assembly for one agent turn
//!
//! Each turn reconstructs a working memory from the session transcript and
//! the incoming input, then renders the message list handed to the model:
//!
//! ```text
//! [working-memory view: identity + history summary + pinned facts]
//! [relevant long-term memory block]
//! surviving conversation turns … user input
//! ```
//!
//! The token budget is the working memory's: the identity section is never
//! compressed away, and when the window overflows the oldest conversation
//! turns are folded into the summary first, so the priority ordering is
//! system > working memory > recalled memories > oldest turns.

use selkie_core::{
    AGENT_MEMORY_CONTEXT_CHARS_MAX, AGENT_MEMORY_RECALL_COUNT,
    MEMORY_COMPRESSION_KEEP_RECENT_COUNT, SESSION_CONTEXT_MESSAGES_COUNT,
};
use selkie_llm::ChatMessage;
use selkie_memory::{MemorySystem, WorkingMemory, WorkingMemoryConfig};
use selkie_session::{SessionKey, SessionStore};
use std::sync::Arc;

/// Builds per-turn message lists
pub struct ContextBuilder {
    /// Identity and behaviour preamble; becomes the working memory's
    /// identity section
    system_prompt: String,
    /// Token budget over the assembled context
    budget_tokens: u32,
    /// Facts pinned into every turn's working memory
    pinned_facts: Vec<String>,
    memory: Arc<MemorySystem>,
    sessions: Arc<SessionStore>,
}

impl ContextBuilder {
    pub fn new(
        system_prompt: impl Into<String>,
        budget_tokens: u32,
        memory: Arc<MemorySystem>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        assert!(budget_tokens > 0, "context budget must be positive");
        Self {
            system_prompt: system_prompt.into(),
            budget_tokens,
            pinned_facts: Vec::new(),
            memory,
            sessions,
        }
    }

    /// Pin a fact into every subsequent turn's working memory
    pub fn pin_fact(&mut self, fact: impl Into<String>) {
        self.pinned_facts.push(fact.into());
    }

    /// Assemble the messages for one turn
    ///
    /// The working memory is never persisted; it is rebuilt here from the
    /// transcript and the fresh input each time.
    pub async fn build(&self, key: &SessionKey, user_input: &str) -> Vec<ChatMessage> {
        let mut working = WorkingMemory::new(WorkingMemoryConfig {
            max_tokens: self.budget_tokens,
            keep_recent: MEMORY_COMPRESSION_KEEP_RECENT_COUNT,
        });
        working.set_identity(self.system_prompt.clone());
        for fact in &self.pinned_facts {
            working.pin_fact(fact.clone());
        }

        let history = self
            .sessions
            .history(key, SESSION_CONTEXT_MESSAGES_COUNT)
            .await
            .unwrap_or_default();
        for message in history {
            working.add_message(message.role, message.content);
        }
        working.add_message("user", user_input);

        // The rendered working-memory view (identity, folded history,
        // pinned facts) is the system message.
        let mut messages = vec![ChatMessage::system(working.render_context())];

        // Memory recall failures degrade to a contextless turn
        match self
            .memory
            .recall(user_input, AGENT_MEMORY_RECALL_COUNT)
            .await
        {
            Ok(context) if !context.is_empty() => {
                let mut context = context;
                if context.len() > AGENT_MEMORY_CONTEXT_CHARS_MAX {
                    context = truncate_at_boundary(&context, AGENT_MEMORY_CONTEXT_CHARS_MAX);
                }
                messages.push(ChatMessage::system(format!("[Relevant memory]\n{}", context)));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "memory recall failed, continuing without context");
            }
        }

        // Conversation turns that survived compression; the fresh user
        // input is always last
        for message in working.messages() {
            messages.push(ChatMessage {
                role: message.role.clone(),
                content: message.content.clone(),
            });
        }

        messages
    }
}

/// Truncate at a char boundary at or below `max_bytes`
fn truncate_at_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
