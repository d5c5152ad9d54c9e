//! The message bus
//!
//! Inbound: adapters publish, subscribers handle; delivery is at-most-once
//! per subscriber per message within the process, and a handler failure is
//! logged without affecting other subscribers. Outbound: messages go to the
//! delivery queue, which retries through the registered channel senders.

use crate::events::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use selkie_core::metrics::{Metrics, SharedMetrics};
use selkie_core::Result;
use selkie_queue::{DeliveryQueue, QueuedDelivery};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handles inbound messages from any channel
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<()>;
}

/// The channel bus
pub struct MessageBus {
    /// Inbound subscribers
    handlers: RwLock<Vec<Arc<dyn InboundHandler>>>,
    /// Per-channel allow-lists; a missing or empty set allows everyone
    allow_lists: RwLock<HashMap<String, HashSet<String>>>,
    /// Durable outbound path
    queue: Arc<DeliveryQueue>,
    metrics: SharedMetrics,
}

impl MessageBus {
    /// Create a bus over the delivery queue
    pub fn new(queue: Arc<DeliveryQueue>, metrics: SharedMetrics) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            allow_lists: RwLock::new(HashMap::new()),
            queue,
            metrics,
        }
    }

    /// Subscribe a handler to inbound messages
    pub async fn subscribe_inbound(&self, handler: Arc<dyn InboundHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
        tracing::debug!(count = handlers.len(), "inbound handler subscribed");
    }

    /// Set the allow-list for a channel; an empty list allows all senders
    pub async fn set_allow_list(&self, channel: impl Into<String>, senders: Vec<String>) {
        let channel = channel.into();
        let mut lists = self.allow_lists.write().await;
        if senders.is_empty() {
            lists.remove(&channel);
        } else {
            lists.insert(channel, senders.into_iter().collect());
        }
    }

    /// Whether a sender passes the channel's allow-list
    async fn is_allowed(&self, channel: &str, sender_id: &str) -> bool {
        let lists = self.allow_lists.read().await;
        match lists.get(channel) {
            None => true,
            Some(allowed) => allowed.contains(sender_id),
        }
    }

    /// Publish an inbound message to all subscribers
    ///
    /// Senders outside the channel's allow-list are dropped silently and
    /// counted.
    pub async fn publish_inbound(&self, message: InboundMessage) {
        if !self.is_allowed(&message.channel, &message.sender_id).await {
            Metrics::incr(&self.metrics.bus_denied_total);
            tracing::debug!(
                channel = %message.channel,
                sender = %message.sender_id,
                "sender not on allow-list, dropped"
            );
            return;
        }

        let handlers: Vec<Arc<dyn InboundHandler>> =
            self.handlers.read().await.iter().cloned().collect();
        for handler in handlers {
            if let Err(e) = handler.handle(message.clone()).await {
                tracing::error!(error = %e, channel = %message.channel, "inbound handler failed");
            }
        }
    }

    /// Enqueue an outbound message for durable delivery
    ///
    /// Returns the delivery id.
    pub fn publish_outbound(
        &self,
        message: OutboundMessage,
        agent_id: &str,
        session_key: &str,
    ) -> Result<String> {
        let delivery = QueuedDelivery::new(
            message.channel,
            message.chat_id,
            message.content,
            agent_id,
            session_key,
        );
        self.queue.enqueue(&delivery)?;
        Metrics::incr(&self.metrics.queue_enqueued_total);
        Ok(delivery.id)
    }
}
