//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::init::InitArgs;
use super::commands::run::RunArgs;
use super::commands::serve::ServeArgs;
use super::commands::trigger::TriggerArgs;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "runwire")]
#[command(about = "Runwire - trigger-driven agent runs with distributed run control", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to load instead of .runwire/config.yaml
    #[arg(short, long, global = true, env = "RUNWIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Write the default configuration into .runwire/
    Init(InitArgs),

    /// Run the HTTP server
    Serve(ServeArgs),

    /// List trigger providers
    Providers,

    /// Trigger management commands
    Trigger(TriggerArgs),

    /// Run inspection and control commands
    Run(RunArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::trigger::TriggerCommands;

    #[test]
    fn test_parse_trigger_events() {
        let cli = Cli::try_parse_from([
            "runwire",
            "--json",
            "trigger",
            "events",
            "6f1c2b1e-8c55-4f55-9a8e-0d7f61b2c001",
            "--limit",
            "5",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Trigger(args) => match args.command {
                TriggerCommands::Events { limit, .. } => assert_eq!(limit, 5),
                _ => panic!("expected events"),
            },
            _ => panic!("expected trigger command"),
        }
    }

    #[test]
    fn test_rejects_malformed_run_id() {
        assert!(Cli::try_parse_from(["runwire", "run", "stop", "not-a-uuid"]).is_err());
    }
}
