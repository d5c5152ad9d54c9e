//! Agent-level metrics
//!
//! LLM call counts and latency, plus the distribution over turn termination
//! reasons. Per-tool success/failure lives in the tool registry's own stats.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters for one supervisor agent
#[derive(Debug, Default)]
pub struct AgentMetrics {
    llm_calls: AtomicU64,
    llm_latency_ms_total: AtomicU64,
    terminations: Mutex<HashMap<String, u64>>,
}

/// Serializable snapshot
#[derive(Debug, Clone, Serialize)]
pub struct AgentMetricsSnapshot {
    pub llm_calls: u64,
    pub llm_latency_ms_avg: u64,
    pub terminations: HashMap<String, u64>,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one LLM call and its latency
    pub fn record_llm_call(&self, latency_ms: u64) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.llm_latency_ms_total
            .fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record how a turn ended
    pub fn record_termination(&self, reason: &str) {
        let mut terminations = self.terminations.lock().expect("metrics mutex poisoned");
        *terminations.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Snapshot for the metrics surface
    pub fn snapshot(&self) -> AgentMetricsSnapshot {
        let calls = self.llm_calls.load(Ordering::Relaxed);
        let latency = self.llm_latency_ms_total.load(Ordering::Relaxed);
        AgentMetricsSnapshot {
            llm_calls: calls,
            llm_latency_ms_avg: if calls > 0 { latency / calls } else { 0 },
            terminations: self
                .terminations
                .lock()
                .expect("metrics mutex poisoned")
                .clone(),
        }
    }
}
