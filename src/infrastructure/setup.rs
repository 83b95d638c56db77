//! Project initialization and startup wiring.
//!
//! `init` writes the default project-local config; [`AppContext`] builds the
//! dependency graph once at startup and hands explicit handles to the HTTP
//! server and CLI.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::control::{MemoryControlStore, RedisControlStore};
use crate::adapters::http::AppState;
use crate::adapters::local::{AllowAllBillingGate, LocalSandboxManager, QueueBackgroundRunner};
use crate::adapters::scheduler::{HttpScheduler, HttpSchedulerConfig};
use crate::adapters::sqlite::{
    connection::database_url, initialize_database, PoolConfig, SqliteCatalogRepository,
    SqliteProfileRepository, SqliteRunRepository, SqliteThreadRepository,
    SqliteTriggerEventRepository, SqliteTriggerRepository,
};
use crate::domain::models::{Config, ControlBackend};
use crate::domain::ports::{AgentCatalog, ControlStore, RemoteScheduler, RunRepository, ThreadStore};
use crate::services::{
    ExecutionDeps, ExecutionService, ExecutionSettings, ProviderContext, ProviderRegistry,
    RunControl, RunControlSettings, RunStreamer, TriggerDispatcher, TriggerService,
};

/// Default configuration template content
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Runwire Configuration
# Override settings by editing this file, .runwire/local.yaml, or by setting
# environment variables with the RUNWIRE_ prefix (`__` separates sections):
#   export RUNWIRE_SERVER__PORT=9000
#   export RUNWIRE_CONTROL__BACKEND=redis
#   export RUNWIRE_CONTROL__REDIS_URL=redis://127.0.0.1:6379

server:
  host: "127.0.0.1"
  port: 8000
  # Externally reachable URL; webhook and schedule callbacks are built from it
  public_base_url: "http://127.0.0.1:8000"
  enable_cors: true
  heartbeat_interval_ms: 15000

database:
  path: ".runwire/runwire.db"
  max_connections: 10

logging:
  # trace, debug, info, warn, error
  level: "info"
  # json, pretty
  format: "json"
  # log_dir: ".runwire/logs"
  rotation: "daily"
  enable_stdout: true

control:
  # memory (single process) or redis (shared between processes)
  backend: "memory"
  # redis_url: "redis://127.0.0.1:6379"
  response_ttl_secs: 86400
  marker_ttl_secs: 86400
  status_poll_interval_ms: 5000
  unwind_delay_ms: 500

scheduler:
  enabled: false
  # base_url: "https://qstash.upstash.io"
  # token: ""
  retries: 3
  delay_secs: 5
  request_timeout_secs: 30

execution:
  # instance_id: "a1b2c3d4"
  default_model: "anthropic/claude-sonnet-4"
  enable_thinking: false
  reasoning_effort: "low"
  enable_context_manager: true
"#;

/// Setup paths and directories
pub struct SetupPaths {
    /// Directory holding config and state.
    pub config_dir: PathBuf,
    /// Main config file.
    pub config_file: PathBuf,
    /// SQLite database file.
    pub database_file: PathBuf,
}

impl SetupPaths {
    /// Get setup paths for the current directory
    pub fn new() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::in_dir(current_dir))
    }

    /// Paths rooted at `root` instead of the working directory.
    pub fn in_dir(root: PathBuf) -> Self {
        let config_dir = root.join(".runwire");
        Self {
            config_file: config_dir.join("config.yaml"),
            database_file: config_dir.join("runwire.db"),
            config_dir,
        }
    }

    /// Whether `init` has run here.
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

/// Create the configuration directory and default config file.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")?;
    if paths.config_file.exists() && !force {
        return Ok(());
    }
    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(())
}

/// Short id naming this process on the control plane.
pub fn generate_instance_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Everything a running instance needs, built once at startup.
pub struct AppContext {
    /// Loaded configuration.
    pub config: Config,
    /// Id of this process instance; owns its run markers.
    pub instance_id: String,
    /// SQLite pool.
    pub pool: SqlitePool,
    /// Control store shared with other instances.
    pub control_store: Arc<dyn ControlStore>,
    /// Provider registry.
    pub registry: Arc<ProviderRegistry>,
    /// Trigger lifecycle service.
    pub triggers: Arc<TriggerService>,
    /// Execution service.
    pub execution: Arc<ExecutionService>,
    /// Inbound event dispatcher.
    pub dispatcher: Arc<TriggerDispatcher>,
    /// Run control plane.
    pub control: Arc<RunControl>,
    /// Run output streamer.
    pub streamer: RunStreamer,
    /// Run records.
    pub runs: Arc<dyn RunRepository>,
    /// Projects and threads.
    pub threads: Arc<dyn ThreadStore>,
    /// Agent catalog.
    pub agents: Arc<dyn AgentCatalog>,
}

impl AppContext {
    /// Open the database, connect the control store and scheduler, and wire
    /// every service.
    pub async fn build(config: Config) -> Result<Self> {
        let pool = initialize_database(&database_url(&config.database), Some(PoolConfig::from(&config.database)))
            .await
            .context("Failed to initialize database")?;

        let control_store: Arc<dyn ControlStore> = match config.control.backend {
            ControlBackend::Memory => {
                tracing::warn!("using the in-memory control store; runs cannot be controlled across processes");
                Arc::new(MemoryControlStore::new())
            }
            ControlBackend::Redis => {
                let url = config
                    .control
                    .redis_url
                    .as_deref()
                    .context("control.redis_url is required for the redis backend")?;
                let store = RedisControlStore::connect(url).await.context("Failed to connect to Redis")?;
                store.ping().await.context("Redis did not answer PING")?;
                Arc::new(store)
            }
        };

        let scheduler: Option<Arc<dyn RemoteScheduler>> = if config.scheduler.enabled {
            let settings = HttpSchedulerConfig::from_settings(&config.scheduler)
                .context("Invalid scheduler configuration")?;
            Some(Arc::new(HttpScheduler::new(settings).context("Failed to build scheduler client")?))
        } else {
            tracing::info!("remote scheduler disabled; schedule triggers are unavailable");
            None
        };

        Ok(Self::assemble(config, pool, control_store, scheduler).await)
    }

    /// Wire services over already-opened stores.
    pub async fn assemble(
        config: Config,
        pool: SqlitePool,
        control_store: Arc<dyn ControlStore>,
        scheduler: Option<Arc<dyn RemoteScheduler>>,
    ) -> Self {
        let instance_id = config.execution.instance_id.clone().unwrap_or_else(generate_instance_id);

        let mut provider_context = ProviderContext::new(config.server.public_base_url.clone())
            .with_schedule_delivery(config.scheduler.retries, Duration::from_secs(config.scheduler.delay_secs));
        if let Some(scheduler) = scheduler {
            provider_context = provider_context.with_scheduler(scheduler);
        }
        let registry = Arc::new(ProviderRegistry::with_builtin_providers(provider_context).await);

        let runs: Arc<dyn RunRepository> = Arc::new(SqliteRunRepository::new(pool.clone()));
        let threads: Arc<dyn ThreadStore> = Arc::new(SqliteThreadRepository::new(pool.clone()));
        let catalog = Arc::new(SqliteCatalogRepository::new(pool.clone()));

        let triggers = Arc::new(TriggerService::new(
            Arc::clone(&registry),
            Arc::new(SqliteTriggerRepository::new(pool.clone())),
            Arc::new(SqliteTriggerEventRepository::new(pool.clone())),
        ));

        let control = Arc::new(RunControl::new(
            Arc::clone(&control_store),
            Arc::clone(&runs),
            RunControlSettings {
                instance_id: instance_id.clone(),
                marker_ttl: Duration::from_secs(config.control.marker_ttl_secs),
                response_ttl: Duration::from_secs(config.control.response_ttl_secs),
            },
        ));

        let execution = Arc::new(ExecutionService::new(
            ExecutionDeps {
                agents: catalog.clone(),
                workflows: catalog.clone(),
                threads: Arc::clone(&threads),
                sandboxes: Arc::new(LocalSandboxManager::new()),
                billing: Arc::new(AllowAllBillingGate),
                profiles: Arc::new(SqliteProfileRepository::new(pool.clone())),
                runner: Arc::new(QueueBackgroundRunner::new(Arc::clone(&control_store))),
                runs: Arc::clone(&runs),
            },
            Arc::clone(&control),
            ExecutionSettings::from_config(&config.execution, instance_id.clone()),
        ));

        let dispatcher = Arc::new(TriggerDispatcher::new(Arc::clone(&triggers), Arc::clone(&execution)));
        let streamer = RunStreamer::new(
            Arc::clone(&control_store),
            Arc::clone(&runs),
            Duration::from_millis(config.control.status_poll_interval_ms),
            Duration::from_millis(config.control.unwind_delay_ms),
        );

        tracing::info!(%instance_id, backend = ?config.control.backend, "application context ready");

        Self {
            config,
            instance_id,
            pool,
            control_store,
            registry,
            triggers,
            execution,
            dispatcher,
            control,
            streamer,
            runs,
            threads,
            agents: catalog,
        }
    }

    /// Handler state for the HTTP server.
    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            triggers: Arc::clone(&self.triggers),
            dispatcher: Arc::clone(&self.dispatcher),
            control: Arc::clone(&self.control),
            streamer: self.streamer.clone(),
            runs: Arc::clone(&self.runs),
            threads: Arc::clone(&self.threads),
            agents: Arc::clone(&self.agents),
            heartbeat_interval: Duration::from_millis(self.config.server.heartbeat_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;

    #[test]
    fn test_default_template_is_valid_config() {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        crate::infrastructure::config::ConfigLoader::validate(&config).unwrap();
        assert_eq!(config.control.backend, ControlBackend::Memory);
    }

    #[test]
    fn test_create_config_file_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SetupPaths::in_dir(dir.path().to_path_buf());
        assert!(!paths.is_initialized());

        create_config_file(&paths, false).unwrap();
        assert!(paths.is_initialized());

        fs::write(&paths.config_file, "custom: true").unwrap();
        create_config_file(&paths, false).unwrap();
        assert_eq!(fs::read_to_string(&paths.config_file).unwrap(), "custom: true");

        create_config_file(&paths, true).unwrap();
        assert!(fs::read_to_string(&paths.config_file).unwrap().contains("public_base_url"));
    }

    #[test]
    fn test_instance_id_is_short_hex() {
        let id = generate_instance_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_assemble_uses_configured_instance_id() {
        let pool = crate::adapters::sqlite::create_migrated_test_pool().await.unwrap();
        let mut config = Config::default();
        config.execution.instance_id = Some("inst0001".to_string());

        let ctx = AppContext::assemble(config, pool, Arc::new(MemoryControlStore::new()), None).await;
        assert_eq!(ctx.instance_id, "inst0001");
        assert_eq!(ctx.control.instance_id(), "inst0001");
    }
}
