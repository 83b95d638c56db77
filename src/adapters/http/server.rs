//! Router assembly and serving.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{runs, triggers};
use crate::domain::models::ServerConfig;
use crate::domain::ports::{AgentCatalog, RunRepository, ThreadStore};
use crate::services::{RunControl, RunStreamer, TriggerDispatcher, TriggerService};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Allow any origin.
    pub enable_cors: bool,
    /// SSE keep-alive interval.
    pub heartbeat_interval: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for HttpServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
        }
    }
}

/// Shared state of every handler.
pub struct AppState {
    /// Trigger lifecycle.
    pub triggers: Arc<TriggerService>,
    /// Webhook dispatch.
    pub dispatcher: Arc<TriggerDispatcher>,
    /// Run control.
    pub control: Arc<RunControl>,
    /// Run streaming.
    pub streamer: RunStreamer,
    /// Run records.
    pub runs: Arc<dyn RunRepository>,
    /// Threads, for ownership checks.
    pub threads: Arc<dyn ThreadStore>,
    /// Agents, for ownership checks.
    pub agents: Arc<dyn AgentCatalog>,
    /// SSE keep-alive interval.
    pub heartbeat_interval: Duration,
}

/// HTTP API server.
pub struct HttpServer {
    config: HttpServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Server over `state`.
    pub fn new(state: Arc<AppState>, config: HttpServerConfig) -> Self {
        Self { config, state }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let app = Router::new()
            .route("/health", get(health_check))
            // Trigger management
            .route("/api/triggers/providers", get(triggers::list_providers))
            .route(
                "/api/agents/{agent_id}/triggers",
                get(triggers::list_agent_triggers).post(triggers::create_trigger),
            )
            .route(
                "/api/triggers/{trigger_id}",
                get(triggers::get_trigger)
                    .put(triggers::update_trigger)
                    .delete(triggers::delete_trigger),
            )
            .route("/api/triggers/{trigger_id}/activate", post(triggers::activate_trigger))
            .route("/api/triggers/{trigger_id}/deactivate", post(triggers::deactivate_trigger))
            .route("/api/triggers/{trigger_id}/health", get(triggers::trigger_health))
            .route("/api/triggers/{trigger_id}/events", get(triggers::list_trigger_events))
            // Inbound events
            .route("/api/triggers/{trigger_id}/webhook", post(triggers::receive_webhook))
            // Runs
            .route("/api/agent-runs/{run_id}", get(runs::get_run))
            .route("/api/agent-runs/{run_id}/stream", get(runs::stream_run))
            .route("/api/agent-runs/{run_id}/stop", post(runs::stop_run))
            .with_state(Arc::clone(&self.state));

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Serve until `shutdown` resolves, then stop every run this instance
    /// still owns.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = self.router();

        tracing::info!(%addr, instance_id = %self.state.control.instance_id(), "runwire HTTP server listening");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        let stopped = self.state.control.shutdown_instance().await;
        tracing::info!(stopped = stopped.len(), "HTTP server stopped");
        Ok(())
    }
}

async fn health_check() -> &'static str {
    "OK"
}
