//! Conduit CLI application
//!
//! Launches configured stdio workers under a supervisor and talks to them
//! from the command line.
//!
//! # Installation
//!
//! ```bash
//! cargo install --path crates/conduit-cli
//! ```
//!
//! # Usage
//!
//! ```bash
//! conduit services                                  # what can be called
//! conduit call hack Hover hover '{"line": 12}'      # single response
//! conduit subscribe hack Build progress '["app"]'   # streamed values
//! conduit --trace call hack Hover hover '[12]'      # log raw messages
//! ```
//!
//! Set `RUST_LOG` to override the configured log level.

mod args;
mod commands;
mod logging;
mod router;

use args::Cli;
use clap::Parser;
use conduit_core::ConduitConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ConduitConfig::load_from_file(&cli.config)?;

    logging::init(&config.logging, cli.verbose, cli.trace)?;

    let registry = router::install_registry(&config)?;
    router::route(cli, config, registry).await
}
