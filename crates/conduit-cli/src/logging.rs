//! Tracing subscriber setup

use conduit_core::{Direction, LoggingConfig, MessageLogger};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Target of raw message events emitted by `--trace`
pub const WIRE_TARGET: &str = "conduit::wire";

/// Install the global subscriber. Logs go to stderr; stdout carries results.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig, verbose: bool, trace: bool) -> anyhow::Result<()> {
    let mut filter = build_filter(config, verbose);
    if trace {
        filter = filter.add_directive(format!("{}=trace", WIRE_TARGET).parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}

fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Message logger forwarding every raw message to the wire target
pub fn wire_logger() -> MessageLogger {
    Arc::new(|direction: Direction, raw: &str| {
        tracing::trace!(target: WIRE_TARGET, %direction, "{}", raw);
    })
}
