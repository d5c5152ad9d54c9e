//! Selkie Sessions
//!
//! Per-peer conversation state: the canonical session-key grammar, an
//! append-only JSONL transcript per session, a compact `sessions.jsonl`
//! index, and archiving of idle sessions. All mutation goes through
//! [`SessionStore`]; operations on the same key are serialized, different
//! keys proceed in parallel.

pub mod key;
pub mod store;
pub mod types;

pub use key::SessionKey;
pub use store::SessionStore;
pub use types::{Session, SessionMessage, SessionSummary};
