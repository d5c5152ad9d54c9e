//! Selkie Server
//!
//! The gateway in front of the assistant core: a WebSocket JSON-RPC 2.0
//! server with bearer-token auth, server-initiated event streams for chat,
//! and the process wiring that assembles the agent, memory, sessions, bus
//! and delivery queue into one runtime.

pub mod auth;
pub mod gateway;
pub mod rpc;
pub mod state;

pub use auth::TokenAuth;
pub use gateway::router;
pub use state::AppState;
