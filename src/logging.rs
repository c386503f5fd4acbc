//! `tracing` subscriber setup for the binary.
//!
//! The library only emits events; installing a subscriber is left to the
//! process entry point. Targets in use: `replit::lexer`, `replit::compiler`,
//! `replit::vm` and `replit::cli`.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Build the filter for a directive, falling back to `warn` when it does not parse.
pub fn filter_for(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a stderr subscriber filtered by `config.log_filter`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(config: &Config) {
    let layer = fmt::layer()
        .compact()
        .with_target(true)
        .without_time()
        .with_ansi(config.color)
        .with_writer(io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter_for(&config.log_filter))
        .with(layer)
        .try_init();
}
