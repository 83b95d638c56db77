//! SQLite implementation of the ThreadStore: projects, threads and messages.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MessageRole, Project, SandboxHandle, Thread};
use crate::domain::ports::ThreadStore;

/// SQLite projects, threads and messages.
#[derive(Clone)]
pub struct SqliteThreadRepository {
    pool: SqlitePool,
}

impl SqliteThreadRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load a project.
    pub async fn get_project(&self, project_id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(project_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_project).transpose()
    }

    /// Message contents of a thread in insertion order.
    pub async fn list_messages(&self, thread_id: Uuid) -> DomainResult<Vec<(MessageRole, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT role, content FROM messages WHERE thread_id = ? ORDER BY rowid")
                .bind(thread_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(role, content)| {
                let role = match role.as_str() {
                    "user" => MessageRole::User,
                    "assistant" => MessageRole::Assistant,
                    "system" => MessageRole::System,
                    other => {
                        return Err(DomainError::SerializationError(format!("Unknown message role: {other}")))
                    }
                };
                Ok((role, content))
            })
            .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: String,
    account_id: String,
    name: String,
    sandbox: Option<String>,
    created_at: String,
}

fn row_to_project(row: ProjectRow) -> DomainResult<Project> {
    Ok(Project {
        project_id: parse_uuid(&row.id)?,
        account_id: parse_uuid(&row.account_id)?,
        name: row.name,
        sandbox: row.sandbox.map(|s| serde_json::from_str(&s)).transpose()?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct ThreadRow {
    id: String,
    project_id: String,
    account_id: String,
    agent_id: Option<String>,
    metadata: Option<String>,
    created_at: String,
}

fn row_to_thread(row: ThreadRow) -> DomainResult<Thread> {
    Ok(Thread {
        thread_id: parse_uuid(&row.id)?,
        project_id: parse_uuid(&row.project_id)?,
        account_id: parse_uuid(&row.account_id)?,
        agent_id: parse_optional_uuid(row.agent_id)?,
        metadata: parse_json_or_default(row.metadata)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl ThreadStore for SqliteThreadRepository {
    async fn create_project(&self, account_id: Uuid, name: &str) -> DomainResult<Project> {
        let project = Project {
            project_id: Uuid::new_v4(),
            account_id,
            name: name.to_string(),
            sandbox: None,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO projects (id, account_id, name, sandbox, created_at) VALUES (?, ?, ?, NULL, ?)")
            .bind(project.project_id.to_string())
            .bind(account_id.to_string())
            .bind(&project.name)
            .bind(project.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(project)
    }

    async fn attach_sandbox(&self, project_id: Uuid, sandbox: &SandboxHandle) -> DomainResult<()> {
        let result = sqlx::query("UPDATE projects SET sandbox = ? WHERE id = ?")
            .bind(serde_json::to_string(sandbox)?)
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!("project {project_id} does not exist")));
        }
        Ok(())
    }

    async fn delete_project(&self, project_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_thread(
        &self,
        project_id: Uuid,
        account_id: Uuid,
        agent_id: Option<Uuid>,
        metadata: Value,
    ) -> DomainResult<Thread> {
        let thread = Thread {
            thread_id: Uuid::new_v4(),
            project_id,
            account_id,
            agent_id,
            metadata,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO threads (id, project_id, account_id, agent_id, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(thread.thread_id.to_string())
        .bind(project_id.to_string())
        .bind(account_id.to_string())
        .bind(agent_id.map(|id| id.to_string()))
        .bind(serde_json::to_string(&thread.metadata)?)
        .bind(thread.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(thread)
    }

    async fn get_thread(&self, thread_id: Uuid) -> DomainResult<Option<Thread>> {
        let row: Option<ThreadRow> = sqlx::query_as("SELECT * FROM threads WHERE id = ?")
            .bind(thread_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_thread).transpose()
    }

    async fn add_message(&self, thread_id: Uuid, role: MessageRole, content: &str) -> DomainResult<Uuid> {
        let message_id = Uuid::new_v4();
        sqlx::query("INSERT INTO messages (id, thread_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(message_id.to_string())
            .bind(thread_id.to_string())
            .bind(role.as_str())
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_delete_project_cascades_to_threads() {
        let store = SqliteThreadRepository::new(create_migrated_test_pool().await.unwrap());
        let account_id = Uuid::new_v4();
        let project = store.create_project(account_id, "Trigger: nightly").await.unwrap();
        let thread = store
            .create_thread(project.project_id, account_id, None, json!({"trigger_execution": true}))
            .await
            .unwrap();
        store.add_message(thread.thread_id, MessageRole::User, "hello").await.unwrap();

        store.delete_project(project.project_id).await.unwrap();

        assert!(store.get_thread(thread.thread_id).await.unwrap().is_none());
        assert!(store.get_project(project.project_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_sandbox_is_persisted() {
        let store = SqliteThreadRepository::new(create_migrated_test_pool().await.unwrap());
        let project = store.create_project(Uuid::new_v4(), "p").await.unwrap();
        let sandbox = SandboxHandle {
            sandbox_id: "sbx-1".to_string(),
            pass: "secret".to_string(),
            vnc_preview: None,
            sandbox_url: Some("http://sandbox".to_string()),
        };

        store.attach_sandbox(project.project_id, &sandbox).await.unwrap();

        let loaded = store.get_project(project.project_id).await.unwrap().unwrap();
        assert_eq!(loaded.sandbox, Some(sandbox));
    }
}
