//! Delivery worker
//!
//! A single worker owns all mutation of the queue directory after enqueue.
//! Each tick scans for due deliveries, dead-letters the exhausted, attempts
//! the rest through the registered per-channel sender, and reschedules
//! failures with backoff. Delivery errors never crash the host process.

use crate::queue::DeliveryQueue;
use crate::types::{QueuedDelivery, SendOutcome};
use async_trait::async_trait;
use selkie_core::metrics::{Metrics, SharedMetrics};
use selkie_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Sends a delivery out through one channel
#[async_trait]
pub trait DeliverySender: Send + Sync {
    async fn send(&self, delivery: &QueuedDelivery) -> SendOutcome;
}

/// The queue worker
pub struct DeliveryWorker {
    queue: Arc<DeliveryQueue>,
    senders: HashMap<String, Arc<dyn DeliverySender>>,
    scan_interval: Duration,
    metrics: SharedMetrics,
}

impl DeliveryWorker {
    /// Create a worker over the queue
    pub fn new(queue: Arc<DeliveryQueue>, scan_interval: Duration, metrics: SharedMetrics) -> Self {
        assert!(!scan_interval.is_zero(), "scan interval must be positive");
        Self {
            queue,
            senders: HashMap::new(),
            scan_interval,
            metrics,
        }
    }

    /// Register the sender for a channel
    pub fn register_sender(&mut self, channel: impl Into<String>, sender: Arc<dyn DeliverySender>) {
        self.senders.insert(channel.into(), sender);
    }

    /// Run one worker pass; returns the number of successful deliveries
    pub async fn tick(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let due: Vec<QueuedDelivery> = self
            .queue
            .scan()?
            .into_iter()
            .filter(|d| d.is_due(now))
            .collect();

        let mut delivered = 0;
        for mut delivery in due {
            if delivery.is_exhausted() {
                if let Err(e) = self.queue.dead_letter(&delivery.id) {
                    tracing::error!(id = %delivery.id, error = %e, "dead-letter move failed");
                } else {
                    Metrics::incr(&self.metrics.queue_dead_lettered_total);
                }
                continue;
            }

            let Some(sender) = self.senders.get(&delivery.channel) else {
                // No sender registered yet (channel still starting up);
                // treated as a transient failure.
                tracing::warn!(channel = %delivery.channel, "no sender for channel");
                delivery.record_failure(format!("no sender for channel {}", delivery.channel));
                self.persist_or_log(&delivery);
                continue;
            };

            match sender.send(&delivery).await {
                SendOutcome::Delivered => match self.queue.ack(&delivery.id) {
                    Ok(()) => {
                        delivered += 1;
                        Metrics::incr(&self.metrics.queue_delivered_total);
                        tracing::debug!(id = %delivery.id, "delivery acked");
                    }
                    Err(e) => {
                        // The send succeeded but the ack failed; the file
                        // stays and the message will be re-sent. This is the
                        // at-least-once duplicate window.
                        tracing::error!(id = %delivery.id, error = %e, "ack failed");
                    }
                },
                SendOutcome::Retry(reason) => {
                    tracing::debug!(id = %delivery.id, %reason, retry = delivery.retry_count + 1, "send failed, scheduling retry");
                    delivery.record_failure(reason);
                    self.persist_or_log(&delivery);
                }
                SendOutcome::Fatal(reason) => {
                    tracing::warn!(id = %delivery.id, %reason, "non-retryable failure");
                    delivery.last_error = Some(reason);
                    let _ = self.queue.write(&delivery);
                    if self.queue.dead_letter(&delivery.id).is_ok() {
                        Metrics::incr(&self.metrics.queue_dead_lettered_total);
                    }
                }
            }
        }

        Ok(delivered)
    }

    fn persist_or_log(&self, delivery: &QueuedDelivery) {
        if let Err(e) = self.queue.write(delivery) {
            // Leave the old file in place; next scan retries with the stale
            // retry count, which is safe under at-least-once.
            tracing::error!(id = %delivery.id, error = %e, "cannot persist retry state");
        }
    }

    /// Run ticks until the live queue is empty or nothing more is due
    ///
    /// Used by tests and graceful shutdown; does not wait out future
    /// `next_retry_at` times.
    pub async fn drain(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let delivered = self.tick().await?;
            total += delivered;

            let now = chrono::Utc::now();
            let more_due = self
                .queue
                .scan()?
                .iter()
                .any(|d| d.is_due(now));
            if !more_due {
                break;
            }
        }
        Ok(total)
    }

    /// Run the worker loop until cancelled
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.scan_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "worker tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("delivery worker stopping");
                        break;
                    }
                }
            }
        }
    }
}
