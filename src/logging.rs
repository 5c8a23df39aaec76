//! Structured logging setup.
//!
//! Thin wrapper over `tracing-subscriber`. Library code only emits `tracing`
//! events; embedding applications either call [`init`] once at startup or
//! install their own subscriber.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level. Calling this more than once is harmless; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
