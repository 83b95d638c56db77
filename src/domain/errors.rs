//! Domain errors for the runwire trigger and run-control engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the runwire system.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No trigger with this id.
    #[error("Trigger not found: {0}")]
    TriggerNotFound(Uuid),

    /// No provider registered under this id.
    #[error("Trigger provider not found: {0}")]
    ProviderNotFound(String),

    /// Invalid provider configuration. Surfaces synchronously; the trigger
    /// is never persisted.
    #[error("Invalid trigger configuration: {0}")]
    Configuration(String),

    /// The provider's external side effect could not be installed.
    #[error("Trigger provider setup failed: {0}")]
    ProviderSetup(String),

    /// A provider returned an inconsistent result.
    #[error("Invalid trigger result: {0}")]
    InvalidTriggerResult(String),

    /// No run with this id.
    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    /// No agent with this id.
    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    /// No workflow with this id.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The workflow exists but may not run.
    #[error("Workflow is not active: {0}")]
    WorkflowInactive(String),

    /// No thread with this id.
    #[error("Thread not found: {0}")]
    ThreadNotFound(Uuid),

    /// The caller does not own the resource.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The billing gate refused execution.
    #[error("Billing check failed: {0}")]
    BillingDenied(String),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The control store failed.
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    /// An external HTTP service failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Starting a run failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
