//! Repository ports for triggers and their event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Trigger, TriggerEvent, TriggerResult, TriggerType};

/// Repository for persisting and querying triggers.
#[async_trait]
pub trait TriggerRepository: Send + Sync {
    /// Insert a new trigger.
    async fn create(&self, trigger: &Trigger) -> DomainResult<()>;

    /// Get a trigger by ID.
    async fn get(&self, trigger_id: Uuid) -> DomainResult<Option<Trigger>>;

    /// Overwrite an existing trigger.
    async fn update(&self, trigger: &Trigger) -> DomainResult<()>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete(&self, trigger_id: Uuid) -> DomainResult<bool>;

    /// All triggers of an agent, newest first.
    async fn list_by_agent(&self, agent_id: Uuid) -> DomainResult<Vec<Trigger>>;

    /// Active triggers of one type.
    async fn list_active_by_type(&self, trigger_type: TriggerType) -> DomainResult<Vec<Trigger>>;
}

/// A logged trigger occurrence and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEventRecord {
    /// Id of the recorded event.
    pub event_id: Uuid,
    /// Trigger the event was delivered to.
    pub trigger_id: Uuid,
    /// Agent owning the trigger.
    pub agent_id: Uuid,
    /// Trigger type.
    pub trigger_type: TriggerType,
    /// Payload as received.
    pub raw_data: Value,
    /// Receipt time.
    pub timestamp: DateTime<Utc>,
    /// Whether the provider produced a usable result.
    pub success: bool,
    /// Whether an agent run was requested.
    pub should_execute_agent: bool,
    /// Whether a workflow run was requested.
    pub should_execute_workflow: bool,
    /// Provider error, if any.
    pub error_message: Option<String>,
    /// Execution outcome, once the event has been acted on.
    pub execution: Option<Value>,
}

impl TriggerEventRecord {
    /// Summarize a processed event.
    pub fn new(event: &TriggerEvent, result: &TriggerResult) -> Self {
        Self {
            event_id: event.event_id,
            trigger_id: event.trigger_id,
            agent_id: event.agent_id,
            trigger_type: event.trigger_type,
            raw_data: event.raw_data.clone(),
            timestamp: event.timestamp,
            success: result.success(),
            should_execute_agent: result.should_execute_agent(),
            should_execute_workflow: result.should_execute_workflow(),
            error_message: result.error_message().map(str::to_string),
            execution: None,
        }
    }
}

/// Append-only log of trigger events.
#[async_trait]
pub trait TriggerEventLogRepository: Send + Sync {
    /// Append an event record.
    async fn record(&self, record: &TriggerEventRecord) -> DomainResult<()>;

    /// Attach the execution outcome to a logged event.
    async fn record_execution(&self, event_id: Uuid, execution: &Value) -> DomainResult<()>;

    /// Most recent events of a trigger first.
    async fn list_for_trigger(&self, trigger_id: Uuid, limit: u32) -> DomainResult<Vec<TriggerEventRecord>>;
}
