//! CLI argument definitions using clap
//!
//! - conduit services                          # List registered services
//! - conduit workers                           # List configured workers
//! - conduit call <worker> <svc> <method> ...  # One request, one response
//! - conduit subscribe <worker> <svc> <method> # Print streamed values
//! - conduit notify <worker> <svc> <method>    # Fire and forget

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default configuration file name used across all CLI commands.
pub const DEFAULT_CONFIG_FILE: &str = "conduit.toml";

#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(about = "Conduit - talk to supervised stdio workers")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true, env = "CONDUIT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log every raw message exchanged with the worker
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered services and their methods
    Services {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List configured workers
    Workers {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Call a method and print its result
    Call(CallArgs),

    /// Call a streaming method and print each value as it arrives
    Subscribe(CallArgs),

    /// Send a notification without waiting for an answer
    Notify(CallArgs),
}

/// Target and arguments of a remote call
#[derive(Args, Clone, Debug)]
pub struct CallArgs {
    /// Configured worker name
    pub worker: String,
    /// Service name
    pub service: String,
    /// Method name
    pub method: String,
    /// Arguments as JSON: an array (positional) or an object (named)
    pub params: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::try_parse_from([
            "conduit",
            "--trace",
            "call",
            "hack",
            "Hover",
            "hover",
            r#"{"line": 3}"#,
        ])
        .unwrap();

        assert!(cli.trace);
        assert!(!cli.verbose);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        match cli.command {
            Commands::Call(args) => {
                assert_eq!(args.worker, "hack");
                assert_eq!(args.service, "Hover");
                assert_eq!(args.method, "hover");
                assert_eq!(args.params.as_deref(), Some(r#"{"line": 3}"#));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["conduit", "services", "-v", "--config", "other.yaml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(matches!(cli.command, Commands::Services { .. }));
    }

    #[test]
    fn test_params_are_optional() {
        let cli = Cli::try_parse_from(["conduit", "notify", "hack", "Log", "flush"]).unwrap();
        match cli.command {
            Commands::Notify(args) => assert!(args.params.is_none()),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
