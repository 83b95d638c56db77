//! SQLite implementation of the TriggerRepository.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Trigger, TriggerConfig, TriggerIdentity, TriggerMetadata, TriggerType};
use crate::domain::ports::TriggerRepository;

/// SQLite triggers.
#[derive(Clone)]
pub struct SqliteTriggerRepository {
    pool: SqlitePool,
}

impl SqliteTriggerRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TriggerRow {
    id: String,
    agent_id: String,
    provider_id: String,
    trigger_type: String,
    name: String,
    description: Option<String>,
    config: String,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

fn row_to_trigger(row: TriggerRow) -> DomainResult<Trigger> {
    let trigger_type = TriggerType::from_str(&row.trigger_type).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown trigger type: {}", row.trigger_type))
    })?;
    let config: Map<String, Value> = serde_json::from_str(&row.config)?;

    Ok(Trigger::restore(
        TriggerIdentity {
            trigger_id: parse_uuid(&row.id)?,
            agent_id: parse_uuid(&row.agent_id)?,
        },
        row.provider_id,
        trigger_type,
        TriggerConfig::restore(row.name, row.description, config, row.is_active != 0),
        TriggerMetadata {
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        },
    ))
}

#[async_trait]
impl TriggerRepository for SqliteTriggerRepository {
    async fn create(&self, trigger: &Trigger) -> DomainResult<()> {
        let config = serde_json::to_string(trigger.config())?;

        sqlx::query(
            r#"INSERT INTO triggers
               (id, agent_id, provider_id, trigger_type, name, description, config,
                is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(trigger.trigger_id().to_string())
        .bind(trigger.agent_id().to_string())
        .bind(&trigger.provider_id)
        .bind(trigger.trigger_type.as_str())
        .bind(trigger.name())
        .bind(trigger.description())
        .bind(&config)
        .bind(if trigger.is_active() { 1i32 } else { 0i32 })
        .bind(trigger.metadata.created_at.to_rfc3339())
        .bind(trigger.metadata.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, trigger_id: Uuid) -> DomainResult<Option<Trigger>> {
        let row: Option<TriggerRow> = sqlx::query_as("SELECT * FROM triggers WHERE id = ?")
            .bind(trigger_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_trigger).transpose()
    }

    async fn update(&self, trigger: &Trigger) -> DomainResult<()> {
        let config = serde_json::to_string(trigger.config())?;

        let result = sqlx::query(
            r#"UPDATE triggers SET
               provider_id = ?, trigger_type = ?, name = ?, description = ?,
               config = ?, is_active = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&trigger.provider_id)
        .bind(trigger.trigger_type.as_str())
        .bind(trigger.name())
        .bind(trigger.description())
        .bind(&config)
        .bind(if trigger.is_active() { 1i32 } else { 0i32 })
        .bind(trigger.metadata.updated_at.to_rfc3339())
        .bind(trigger.trigger_id().to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TriggerNotFound(trigger.trigger_id()));
        }
        Ok(())
    }

    async fn delete(&self, trigger_id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM triggers WHERE id = ?")
            .bind(trigger_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_agent(&self, agent_id: Uuid) -> DomainResult<Vec<Trigger>> {
        let rows: Vec<TriggerRow> =
            sqlx::query_as("SELECT * FROM triggers WHERE agent_id = ? ORDER BY created_at DESC")
                .bind(agent_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_trigger).collect()
    }

    async fn list_active_by_type(&self, trigger_type: TriggerType) -> DomainResult<Vec<Trigger>> {
        let rows: Vec<TriggerRow> = sqlx::query_as(
            "SELECT * FROM triggers WHERE trigger_type = ? AND is_active = 1 ORDER BY created_at",
        )
        .bind(trigger_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_trigger).collect()
    }
}
