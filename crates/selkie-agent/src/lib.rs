//! Selkie Supervisor Agent
//!
//! One agent turn takes `(session_key, text)` and produces a stream of
//! reply chunks plus structured side-effects. The loop: build context
//! (system prompt, recalled memories, recent transcript), call the LLM,
//! execute requested tools, feed observations back, iterate — bounded by a
//! step cap. Destructive tools are held behind a confirmation gate keyed by
//! session; a multilingual lexeme check decides confirm/cancel without
//! consulting the model.

pub mod confirm;
pub mod context;
pub mod metrics;
pub mod supervisor;

pub use confirm::{ConfirmationStore, Lexeme, PendingConfirmation};
pub use context::ContextBuilder;
pub use metrics::AgentMetrics;
pub use supervisor::{AgentEvent, SupervisorAgent, TerminationReason};
