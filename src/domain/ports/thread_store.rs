//! Port for projects (isolation containers), threads and messages.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{MessageRole, Project, SandboxHandle, Thread};

/// Projects, threads and messages.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create an isolation project for one run.
    async fn create_project(&self, account_id: Uuid, name: &str) -> DomainResult<Project>;

    /// Record the sandbox attached to a project.
    async fn attach_sandbox(&self, project_id: Uuid, sandbox: &SandboxHandle) -> DomainResult<()>;

    /// Delete a project and everything under it.
    async fn delete_project(&self, project_id: Uuid) -> DomainResult<()>;

    /// Create a thread inside a project.
    async fn create_thread(
        &self,
        project_id: Uuid,
        account_id: Uuid,
        agent_id: Option<Uuid>,
        metadata: Value,
    ) -> DomainResult<Thread>;

    /// Load a thread.
    async fn get_thread(&self, thread_id: Uuid) -> DomainResult<Option<Thread>>;

    /// Append a message, returning its id.
    async fn add_message(&self, thread_id: Uuid, role: MessageRole, content: &str) -> DomainResult<Uuid>;
}
