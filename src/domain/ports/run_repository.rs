//! Repository port for execution runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionRun, RunStatus};

/// Durable run records.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert a new run.
    async fn insert(&self, run: &ExecutionRun) -> DomainResult<()>;

    /// Load a run.
    async fn get(&self, run_id: Uuid) -> DomainResult<Option<ExecutionRun>>;

    /// Write a new status. Terminal statuses also stamp `completed_at`.
    /// Concurrent writers race last-writer-wins.
    async fn update_status(&self, run_id: Uuid, status: RunStatus, error: Option<&str>) -> DomainResult<()>;

    /// Runs currently `running` on a thread.
    async fn list_running_for_thread(&self, thread_id: Uuid) -> DomainResult<Vec<ExecutionRun>>;
}
