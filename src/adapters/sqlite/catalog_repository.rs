//! SQLite-backed agent and workflow catalog.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_json_or_default, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentConfig, Workflow, WorkflowStatus};
use crate::domain::ports::{AgentCatalog, WorkflowCatalog};

/// SQLite agents and workflows.
#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace an agent definition.
    pub async fn upsert_agent(&self, agent: &AgentConfig) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO agents (id, account_id, name, system_prompt, model, config, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 account_id = excluded.account_id, name = excluded.name,
                 system_prompt = excluded.system_prompt, model = excluded.model,
                 config = excluded.config, updated_at = excluded.updated_at"#,
        )
        .bind(agent.agent_id.to_string())
        .bind(agent.account_id.to_string())
        .bind(&agent.name)
        .bind(&agent.system_prompt)
        .bind(&agent.model)
        .bind(serde_json::to_string(&agent.config)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a workflow definition.
    pub async fn upsert_workflow(&self, workflow: &Workflow) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO agent_workflows (id, agent_id, name, description, status, prompt, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 agent_id = excluded.agent_id, name = excluded.name,
                 description = excluded.description, status = excluded.status,
                 prompt = excluded.prompt, updated_at = excluded.updated_at"#,
        )
        .bind(&workflow.workflow_id)
        .bind(workflow.agent_id.to_string())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.status.as_str())
        .bind(&workflow.prompt)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: String,
    account_id: String,
    name: String,
    system_prompt: String,
    model: Option<String>,
    config: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    agent_id: String,
    name: String,
    description: Option<String>,
    status: String,
    prompt: String,
}

#[async_trait]
impl AgentCatalog for SqliteCatalogRepository {
    async fn load_agent_config(&self, agent_id: Uuid) -> DomainResult<Option<AgentConfig>> {
        let row: Option<AgentRow> = sqlx::query_as(
            "SELECT id, account_id, name, system_prompt, model, config FROM agents WHERE id = ?",
        )
        .bind(agent_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(AgentConfig {
                agent_id: parse_uuid(&row.id)?,
                account_id: parse_uuid(&row.account_id)?,
                name: row.name,
                system_prompt: row.system_prompt,
                model: row.model,
                config: parse_json_or_default(row.config)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl WorkflowCatalog for SqliteCatalogRepository {
    async fn get_workflow(&self, workflow_id: &str) -> DomainResult<Option<Workflow>> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            "SELECT id, agent_id, name, description, status, prompt FROM agent_workflows WHERE id = ?",
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status = WorkflowStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!("Unknown workflow status: {}", row.status))
            })?;
            Ok(Workflow {
                workflow_id: row.id,
                agent_id: parse_uuid(&row.agent_id)?,
                name: row.name,
                description: row.description,
                status,
                prompt: row.prompt,
            })
        })
        .transpose()
    }
}
