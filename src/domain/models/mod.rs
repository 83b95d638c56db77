//! Domain models

/// Configuration model.
pub mod config;
pub mod execution;
pub mod run;
pub mod trigger;

pub use config::{
    Config, ControlBackend, ControlConfig, DatabaseConfig, ExecutionConfig, LoggingConfig,
    SchedulerConfig, ServerConfig,
};
pub use execution::{
    AgentConfig, BillingStatus, CredentialProfile, MessageRole, ModelParams, Project, RunJob,
    SandboxHandle, Thread, Workflow, WorkflowStatus,
};
pub use run::{ExecutionRun, RunMetadata, RunStatus, RunTarget, StopCause};
pub use trigger::{
    ExecutionVariables, ProviderDefinition, ProviderKind, Trigger, TriggerConfig, TriggerEvent,
    TriggerIdentity, TriggerMetadata, TriggerResult, TriggerResultParts, TriggerType,
};
