//! Port for the external cron scheduler that delivers schedule callbacks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::DomainResult;

/// A cron job to register remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    /// URL the scheduler POSTs to on every tick.
    pub destination: String,
    /// Five-field cron expression, in UTC.
    pub cron: String,
    /// JSON body delivered with every callback.
    pub body: Value,
    /// Extra headers forwarded with every callback.
    pub headers: Vec<(String, String)>,
    /// Delivery retries on the scheduler side.
    pub retries: u32,
    /// Delay before each delivery.
    pub delay: Duration,
}

/// A schedule as reported by the remote scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSchedule {
    /// Scheduler handle.
    pub schedule_id: String,
    /// Callback URL.
    pub destination: String,
    /// UTC cron line.
    pub cron: String,
    /// Whether the schedule is paused.
    #[serde(default)]
    pub is_paused: bool,
}

/// Remote cron service that calls back into the webhook endpoint.
#[async_trait]
pub trait RemoteScheduler: Send + Sync {
    /// Register a schedule and return its handle.
    async fn create_schedule(&self, request: &ScheduleRequest) -> DomainResult<String>;

    /// Delete a schedule. Deleting an unknown handle succeeds.
    async fn delete_schedule(&self, schedule_id: &str) -> DomainResult<()>;

    /// Fetch a schedule; `None` when it no longer exists.
    async fn get_schedule(&self, schedule_id: &str) -> DomainResult<Option<RemoteSchedule>>;

    /// List every schedule of the account.
    async fn list_schedules(&self) -> DomainResult<Vec<RemoteSchedule>>;
}
