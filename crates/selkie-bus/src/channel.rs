//! Channel adapter contract

use crate::bus::MessageBus;
use crate::events::OutboundMessage;
use async_trait::async_trait;
use selkie_core::Result;
use selkie_queue::{DeliverySender, QueuedDelivery, SendOutcome};
use std::sync::Arc;

/// A channel adapter
///
/// Adapters signal reception by publishing an [`InboundMessage`] on the bus
/// from their own receive loop; the bus never polls them.
///
/// [`InboundMessage`]: crate::events::InboundMessage
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name; the routing key for outbound traffic
    fn name(&self) -> &str;

    /// Start the adapter's receive loop
    async fn start(&self, bus: Arc<MessageBus>) -> Result<()>;

    /// Stop the adapter
    async fn stop(&self) -> Result<()>;

    /// Send one message out through this channel
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}

/// Adapts a [`Channel`] to the delivery queue's sender interface
///
/// Maps channel errors to retryable outcomes; the queue owns the retry
/// schedule.
pub struct ChannelSenderAdapter {
    channel: Arc<dyn Channel>,
}

impl ChannelSenderAdapter {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DeliverySender for ChannelSenderAdapter {
    async fn send(&self, delivery: &QueuedDelivery) -> SendOutcome {
        let message = OutboundMessage::new(
            delivery.channel.clone(),
            delivery.to.clone(),
            delivery.text.clone(),
        );
        match self.channel.send(message).await {
            Ok(()) => SendOutcome::Delivered,
            Err(e) => SendOutcome::Retry(e.to_string()),
        }
    }
}
