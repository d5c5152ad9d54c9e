//! Selkie Channel Bus
//!
//! Normalizes traffic between channel adapters (Telegram, Discord, console…)
//! and the rest of the process. Inbound messages fan out to subscribers
//! at-most-once within the process; outbound durability is the delivery
//! queue's job, not the bus's. Each channel may carry an allow-list; senders
//! outside it are dropped silently and counted.

pub mod bus;
pub mod channel;
pub mod events;

pub use bus::{InboundHandler, MessageBus};
pub use channel::{Channel, ChannelSenderAdapter};
pub use events::{InboundMessage, OutboundMessage};
