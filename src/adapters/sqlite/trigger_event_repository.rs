//! SQLite implementation of the trigger event log.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TriggerType;
use crate::domain::ports::{TriggerEventLogRepository, TriggerEventRecord};

/// SQLite trigger event log.
#[derive(Clone)]
pub struct SqliteTriggerEventRepository {
    pool: SqlitePool,
}

impl SqliteTriggerEventRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TriggerEventRow {
    id: String,
    trigger_id: String,
    agent_id: String,
    trigger_type: String,
    raw_data: String,
    timestamp: String,
    success: i32,
    should_execute_agent: i32,
    should_execute_workflow: i32,
    error_message: Option<String>,
    execution: Option<String>,
}

fn row_to_record(row: TriggerEventRow) -> DomainResult<TriggerEventRecord> {
    let trigger_type = TriggerType::from_str(&row.trigger_type).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown trigger type: {}", row.trigger_type))
    })?;
    let execution = row
        .execution
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()?;

    Ok(TriggerEventRecord {
        event_id: parse_uuid(&row.id)?,
        trigger_id: parse_uuid(&row.trigger_id)?,
        agent_id: parse_uuid(&row.agent_id)?,
        trigger_type,
        raw_data: serde_json::from_str(&row.raw_data)?,
        timestamp: parse_datetime(&row.timestamp)?,
        success: row.success != 0,
        should_execute_agent: row.should_execute_agent != 0,
        should_execute_workflow: row.should_execute_workflow != 0,
        error_message: row.error_message,
        execution,
    })
}

#[async_trait]
impl TriggerEventLogRepository for SqliteTriggerEventRepository {
    async fn record(&self, record: &TriggerEventRecord) -> DomainResult<()> {
        let raw_data = serde_json::to_string(&record.raw_data)?;
        let execution = record.execution.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO trigger_events
               (id, trigger_id, agent_id, trigger_type, raw_data, timestamp, success,
                should_execute_agent, should_execute_workflow, error_message, execution)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.event_id.to_string())
        .bind(record.trigger_id.to_string())
        .bind(record.agent_id.to_string())
        .bind(record.trigger_type.as_str())
        .bind(&raw_data)
        .bind(record.timestamp.to_rfc3339())
        .bind(record.success as i32)
        .bind(record.should_execute_agent as i32)
        .bind(record.should_execute_workflow as i32)
        .bind(&record.error_message)
        .bind(&execution)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_execution(&self, event_id: Uuid, execution: &Value) -> DomainResult<()> {
        sqlx::query("UPDATE trigger_events SET execution = ? WHERE id = ?")
            .bind(serde_json::to_string(execution)?)
            .bind(event_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_trigger(&self, trigger_id: Uuid, limit: u32) -> DomainResult<Vec<TriggerEventRecord>> {
        let rows: Vec<TriggerEventRow> = sqlx::query_as(
            "SELECT * FROM trigger_events WHERE trigger_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(trigger_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }
}
