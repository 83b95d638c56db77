//! Ports for the external collaborators the execution service consumes:
//! sandbox lifecycle, billing gate, credential profiles and the
//! background runner.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BillingStatus, CredentialProfile, RunJob, SandboxHandle};

/// Provisions isolated sandboxes for runs.
#[async_trait]
pub trait SandboxManager: Send + Sync {
    /// Create a sandbox for `project_id`.
    async fn create_sandbox(&self, pass: &str, project_id: Uuid) -> DomainResult<SandboxHandle>;

    /// Delete a sandbox; unknown ids succeed.
    async fn delete_sandbox(&self, sandbox_id: &str) -> DomainResult<()>;
}

/// Pass/fail quota check.
#[async_trait]
pub trait BillingGate: Send + Sync {
    /// Whether `account_id` may start a run.
    async fn check_billing_status(&self, account_id: Uuid) -> DomainResult<BillingStatus>;
}

/// Credential profile lookup.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Default profile named `name` for an account.
    async fn get_default_profile(&self, account_id: Uuid, name: &str) -> DomainResult<Option<CredentialProfile>>;
}

/// Fire-and-forget hand-off to the process that drives the run.
#[async_trait]
pub trait BackgroundRunner: Send + Sync {
    /// Hand a run job to the workers.
    async fn enqueue(&self, job: RunJob) -> DomainResult<()>;
}
