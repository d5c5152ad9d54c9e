//! In-process metrics for Selkie
//!
//! Explicit metric names, type-safe recording, lock-free counters. The
//! snapshot is surfaced through the gateway's `metrics.snapshot` method.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared handle to the process metrics registry
pub type SharedMetrics = Arc<Metrics>;

/// Process-wide metric counters
///
/// All counters are monotonic. Relaxed ordering is sufficient: readers only
/// ever take an approximate snapshot.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Gateway: frames received
    pub gateway_frames_total: AtomicU64,
    /// Gateway: requests rejected for auth failures
    pub gateway_unauthorized_total: AtomicU64,
    /// Gateway: connections refused over the limit
    pub gateway_overloaded_total: AtomicU64,
    /// Bus: inbound messages dropped by allow-lists
    pub bus_denied_total: AtomicU64,
    /// Queue: deliveries enqueued
    pub queue_enqueued_total: AtomicU64,
    /// Queue: deliveries acknowledged
    pub queue_delivered_total: AtomicU64,
    /// Queue: deliveries dead-lettered
    pub queue_dead_lettered_total: AtomicU64,
    /// Memory: captures performed
    pub memory_captures_total: AtomicU64,
    /// Memory: recalls performed
    pub memory_recalls_total: AtomicU64,
    /// Memory: operations served by the fallback backend
    pub memory_fallback_total: AtomicU64,
    /// Agent: LLM calls issued
    pub agent_llm_calls_total: AtomicU64,
    /// Agent: cumulative LLM latency in milliseconds
    pub agent_llm_latency_ms_total: AtomicU64,
}

/// Serializable point-in-time view of the registry
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub gateway_frames_total: u64,
    pub gateway_unauthorized_total: u64,
    pub gateway_overloaded_total: u64,
    pub bus_denied_total: u64,
    pub queue_enqueued_total: u64,
    pub queue_delivered_total: u64,
    pub queue_dead_lettered_total: u64,
    pub memory_captures_total: u64,
    pub memory_recalls_total: u64,
    pub memory_fallback_total: u64,
    pub agent_llm_calls_total: u64,
    pub agent_llm_latency_ms_total: u64,
}

impl Metrics {
    /// Create a fresh registry wrapped for sharing
    pub fn new_shared() -> SharedMetrics {
        Arc::new(Self::default())
    }

    /// Increment a counter by one
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a value to a counter
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Take an approximate snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gateway_frames_total: self.gateway_frames_total.load(Ordering::Relaxed),
            gateway_unauthorized_total: self.gateway_unauthorized_total.load(Ordering::Relaxed),
            gateway_overloaded_total: self.gateway_overloaded_total.load(Ordering::Relaxed),
            bus_denied_total: self.bus_denied_total.load(Ordering::Relaxed),
            queue_enqueued_total: self.queue_enqueued_total.load(Ordering::Relaxed),
            queue_delivered_total: self.queue_delivered_total.load(Ordering::Relaxed),
            queue_dead_lettered_total: self.queue_dead_lettered_total.load(Ordering::Relaxed),
            memory_captures_total: self.memory_captures_total.load(Ordering::Relaxed),
            memory_recalls_total: self.memory_recalls_total.load(Ordering::Relaxed),
            memory_fallback_total: self.memory_fallback_total.load(Ordering::Relaxed),
            agent_llm_calls_total: self.agent_llm_calls_total.load(Ordering::Relaxed),
            agent_llm_latency_ms_total: self.agent_llm_latency_ms_total.load(Ordering::Relaxed),
        }
    }
}
