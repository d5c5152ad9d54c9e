//! Shared application state
//!
//! Everything a connection handler needs, assembled once at startup and
//! cloned per connection. Component wiring follows constructor injection;
//! nothing here is global.

use crate::auth::TokenAuth;
use selkie_agent::SupervisorAgent;
use selkie_bus::MessageBus;
use selkie_core::config::SelkieConfig;
use selkie_core::metrics::SharedMetrics;
use selkie_memory::MemorySystem;
use selkie_session::SessionStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Server version reported by `health`
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state behind every connection
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SelkieConfig>,
    pub agent: Arc<SupervisorAgent>,
    pub sessions: Arc<SessionStore>,
    pub memory: Arc<MemorySystem>,
    pub bus: Arc<MessageBus>,
    pub auth: TokenAuth,
    pub metrics: SharedMetrics,
    /// Live WebSocket connection count
    connections: Arc<AtomicUsize>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<SelkieConfig>,
        agent: Arc<SupervisorAgent>,
        sessions: Arc<SessionStore>,
        memory: Arc<MemorySystem>,
        bus: Arc<MessageBus>,
        metrics: SharedMetrics,
    ) -> Self {
        let auth = TokenAuth::new(config.gateway.auth_token.clone());
        Self {
            config,
            agent,
            sessions,
            memory,
            bus,
            auth,
            metrics,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Try to claim a connection slot; false when the server is full
    pub fn try_connect(&self) -> bool {
        let max = self.config.gateway.connections_max;
        let mut current = self.connections.load(Ordering::Acquire);
        loop {
            if current >= max {
                return false;
            }
            match self.connections.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Release a connection slot
    pub fn disconnect(&self) {
        self.connections.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current live connection count
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }
}
