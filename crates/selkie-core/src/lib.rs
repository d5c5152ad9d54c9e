//! Selkie Core
//!
//! Core types, errors, constants and configuration for the Selkie assistant
//! gateway.
//!
//! # Overview
//!
//! Selkie is a single-process personal assistant runtime: a WebSocket
//! JSON-RPC gateway in front of a tool-calling supervisor agent, backed by a
//! layered memory store and a crash-safe outbound delivery queue. This crate
//! holds the pieces every other crate needs:
//!
//! - explicit limits with units in the name (see [`constants`])
//! - the shared error taxonomy (see [`error`])
//! - environment-driven, validated configuration (see [`config`])
//! - in-process metrics counters (see [`metrics`])
//! - tracing initialization (see [`telemetry`])

pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use config::SelkieConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use telemetry::init_telemetry;
