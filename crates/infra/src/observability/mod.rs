//! Structured logging setup
//!
//! `RUST_LOG` takes precedence over the configured level.

use dermalens_domain::LoggingConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is kept.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    installed.is_ok()
}
