use serde::{Deserialize, Serialize};

/// Main configuration structure for runwire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Run control plane configuration
    #[serde(default)]
    pub control: ControlConfig,

    /// Remote scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Execution defaults
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL; webhook URLs are built from it
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Whether to enable permissive CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Keep-alive interval for SSE streams (milliseconds)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
            enable_cors: default_true(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".runwire/runwire.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Also write to stdout when `log_dir` is set
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            enable_stdout: true,
        }
    }
}

/// Which shared store backs the run control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlBackend {
    /// Process-local store; only suitable for a single process.
    Memory,
    /// Redis lists + pub/sub, shared by every process.
    Redis,
}

/// Run control plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControlConfig {
    /// Which store backs the run control plane.
    #[serde(default = "default_control_backend")]
    pub backend: ControlBackend,

    /// Redis connection URL (required for the redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// TTL of a run's response list (seconds)
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,

    /// TTL of `active_run` instance markers (seconds)
    #[serde(default = "default_marker_ttl_secs")]
    pub marker_ttl_secs: u64,

    /// How often a stream re-checks the durable run status (milliseconds)
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Grace period for listener tasks to unwind after a stream ends (milliseconds)
    #[serde(default = "default_unwind_delay_ms")]
    pub unwind_delay_ms: u64,
}

const fn default_control_backend() -> ControlBackend {
    ControlBackend::Memory
}

const fn default_response_ttl_secs() -> u64 {
    24 * 3600
}

const fn default_marker_ttl_secs() -> u64 {
    24 * 3600
}

const fn default_status_poll_interval_ms() -> u64 {
    5_000
}

const fn default_unwind_delay_ms() -> u64 {
    500
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            backend: default_control_backend(),
            redis_url: None,
            response_ttl_secs: default_response_ttl_secs(),
            marker_ttl_secs: default_marker_ttl_secs(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            unwind_delay_ms: default_unwind_delay_ms(),
        }
    }
}

/// Remote cron scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Whether schedule triggers can be created at all
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the scheduler REST API
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the scheduler API
    #[serde(default)]
    pub token: Option<String>,

    /// Delivery retries requested for each callback
    #[serde(default = "default_scheduler_retries")]
    pub retries: u32,

    /// Delay before each callback delivery (seconds)
    #[serde(default = "default_scheduler_delay_secs")]
    pub delay_secs: u64,

    /// Timeout for scheduler API requests (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_scheduler_retries() -> u32 {
    3
}

const fn default_scheduler_delay_secs() -> u64 {
    5
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            token: None,
            retries: default_scheduler_retries(),
            delay_secs: default_scheduler_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Execution defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    /// Short id of this process instance; generated when absent
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Model used when the agent does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Enable extended thinking for triggered runs.
    #[serde(default)]
    pub enable_thinking: bool,

    /// Reasoning effort hint for triggered runs.
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,

    /// Enable the context manager for triggered runs.
    #[serde(default = "default_true")]
    pub enable_context_manager: bool,
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_reasoning_effort() -> String {
    "low".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            default_model: default_model(),
            enable_thinking: false,
            reasoning_effort: default_reasoning_effort(),
            enable_context_manager: true,
        }
    }
}
