//! Runwire CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runwire::cli::commands::{self, load_config};
use runwire::cli::{Cli, Commands};
use runwire::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let result = run(cli).await;
    if let Err(err) = result {
        runwire::cli::handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init(args) = cli.command {
        init_cli_logging();
        return commands::init::execute(args, cli.json).await;
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;
            commands::serve::execute(args, config).await
        }
        command => {
            init_cli_logging();
            match command {
                Commands::Providers => commands::providers::execute(config, cli.json).await,
                Commands::Trigger(args) => commands::trigger::execute(args, config, cli.json).await,
                Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
                Commands::Init(_) | Commands::Serve(_) => Ok(()),
            }
        }
    }
}

/// One-shot commands log warnings to stderr so stdout stays parseable.
fn init_cli_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
