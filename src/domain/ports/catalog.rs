//! Read ports for agent and workflow definitions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentConfig, Workflow};

/// Agent configuration lookup.
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    /// Load an agent's configuration.
    async fn load_agent_config(&self, agent_id: Uuid) -> DomainResult<Option<AgentConfig>>;
}

/// Workflow lookup.
#[async_trait]
pub trait WorkflowCatalog: Send + Sync {
    /// Load a workflow.
    async fn get_workflow(&self, workflow_id: &str) -> DomainResult<Option<Workflow>>;
}
