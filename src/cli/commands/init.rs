//! Implementation of the `runwire init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::setup::{create_config_file, SetupPaths};

/// Write the default configuration into .runwire/
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Result of `init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether initialization succeeded.
    pub success: bool,
    /// Summary message.
    pub message: String,
    /// Config file written.
    pub config_file: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!("{}\n  config: {}", self.message, self.config_file.display())
    }
}

/// Run `init`.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };
    let paths = SetupPaths::in_dir(target_path);

    let out = if paths.is_initialized() && !args.force {
        InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite the config.".to_string(),
            config_file: paths.config_file,
        }
    } else {
        create_config_file(&paths, args.force)?;
        InitOutput {
            success: true,
            message: "Initialized runwire configuration.".to_string(),
            config_file: paths.config_file,
        }
    };

    output(&out, json_mode);
    Ok(())
}
