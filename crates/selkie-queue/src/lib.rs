//! Selkie Delivery Queue
//!
//! Durable at-least-once delivery of outbound messages across process
//! restarts. One JSON file per pending delivery under `queue_dir`; writes go
//! through a fsynced `.tmp` followed by an atomic rename, so a crash never
//! leaves a half-written live file. A single worker scans the directory,
//! attempts due deliveries through registered per-channel senders, and moves
//! exhausted ones to `failed/`.
//!
//! Order is not preserved; consumers must be idempotent.

pub mod queue;
pub mod types;
pub mod worker;

pub use queue::DeliveryQueue;
pub use types::{backoff_delay, QueuedDelivery, SendOutcome};
pub use worker::{DeliverySender, DeliveryWorker};
