//! Tracing initialization for Selkie
//!
//! One subscriber for the whole process, configured from `RUST_LOG` with a
//! sane default. Call once from the binary entry point.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const TELEMETRY_FILTER_DEFAULT: &str = "info,selkie=debug";

/// Initialize the global tracing subscriber
///
/// `verbosity` raises the floor: 0 uses the default filter, 1 forces debug,
/// 2+ forces trace. Safe to call once; subsequent calls are ignored.
pub fn init_telemetry(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(TELEMETRY_FILTER_DEFAULT)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    if result.is_err() {
        tracing::debug!("telemetry already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_telemetry(0);
        init_telemetry(1);
        init_telemetry(2);
    }
}
