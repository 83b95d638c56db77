//! `runwire serve`: the HTTP server.

use anyhow::Result;
use clap::Args;

use crate::adapters::http::{HttpServer, HttpServerConfig};
use crate::domain::models::Config;
use crate::infrastructure::AppContext;

/// Run the HTTP server
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the configured listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the configured bind host
    #[arg(long)]
    pub host: Option<String>,
}

/// Run the HTTP server until shutdown.
pub async fn execute(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let server_config = HttpServerConfig::from(&config.server);
    let ctx = AppContext::build(config).await?;
    let server = HttpServer::new(ctx.app_state(), server_config);

    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {e}"))?;

    ctx.pool.close().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
