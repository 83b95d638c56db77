//! SQLite implementation of the RunRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionRun, RunStatus};
use crate::domain::ports::RunRepository;

/// SQLite run records.
#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: String,
    thread_id: String,
    project_id: String,
    agent_id: Option<String>,
    status: String,
    error: Option<String>,
    metadata: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

fn row_to_run(row: RunRow) -> DomainResult<ExecutionRun> {
    let status = RunStatus::from_str(&row.status)
        .ok_or_else(|| DomainError::SerializationError(format!("Unknown run status: {}", row.status)))?;

    Ok(ExecutionRun {
        run_id: parse_uuid(&row.id)?,
        thread_id: parse_uuid(&row.thread_id)?,
        project_id: parse_uuid(&row.project_id)?,
        agent_id: parse_optional_uuid(row.agent_id)?,
        status,
        error: row.error,
        metadata: parse_json_or_default(row.metadata)?,
        started_at: parse_datetime(&row.started_at)?,
        completed_at: parse_optional_datetime(row.completed_at)?,
    })
}

const RUN_COLUMNS: &str =
    "id, thread_id, project_id, agent_id, status, error, metadata, started_at, completed_at";

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn insert(&self, run: &ExecutionRun) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO agent_runs
               (id, thread_id, project_id, agent_id, status, error, metadata,
                started_at, completed_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.run_id.to_string())
        .bind(run.thread_id.to_string())
        .bind(run.project_id.to_string())
        .bind(run.agent_id.map(|id| id.to_string()))
        .bind(run.status.as_str())
        .bind(&run.error)
        .bind(serde_json::to_string(&run.metadata)?)
        .bind(run.started_at.to_rfc3339())
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, run_id: Uuid) -> DomainResult<Option<ExecutionRun>> {
        let row: Option<RunRow> = sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM agent_runs WHERE id = ?"))
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_run).transpose()
    }

    async fn update_status(&self, run_id: Uuid, status: RunStatus, error: Option<&str>) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        let completed_at = status.is_terminal().then(|| now.clone());

        let result = sqlx::query(
            "UPDATE agent_runs SET status = ?, error = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(completed_at)
        .bind(&now)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RunNotFound(run_id));
        }
        Ok(())
    }

    async fn list_running_for_thread(&self, thread_id: Uuid) -> DomainResult<Vec<ExecutionRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM agent_runs WHERE thread_id = ? AND status = 'running' ORDER BY started_at"
        ))
        .bind(thread_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_run).collect()
    }
}
