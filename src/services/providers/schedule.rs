//! Cron-driven trigger backed by a remote scheduler.
//!
//! Setup registers a remote cron job that POSTs back to the trigger's own
//! webhook URL. The remote handle is kept in the trigger config under
//! `schedule_id` so teardown and health checks can find it again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::cron_tz::{convert_cron_to_utc, parse_timezone, validate_cron};
use super::webhook_url;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionVariables, Trigger, TriggerEvent, TriggerResult, TriggerType};
use crate::domain::ports::{RemoteSchedule, RemoteScheduler, ScheduleRequest, TriggerProvider};

/// Config key holding the remote schedule handle.
pub const SCHEDULE_ID_KEY: &str = "schedule_id";

/// What a schedule starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    /// Agent run with a prompt.
    Agent,
    /// Workflow run.
    Workflow,
}

impl ExecutionType {
    /// Config form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Workflow => "workflow",
        }
    }

    /// Parse the config form.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(Self::Agent),
            "workflow" => Some(Self::Workflow),
            _ => None,
        }
    }
}

/// Validated schedule trigger configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Five-field cron in `timezone`.
    pub cron_expression: String,
    /// Target kind.
    pub execution_type: ExecutionType,
    /// Prompt for agent schedules.
    pub agent_prompt: Option<String>,
    /// Workflow for workflow schedules.
    pub workflow_id: Option<String>,
    /// Input for workflow schedules.
    pub workflow_input: Option<Value>,
    /// IANA timezone of the cron line.
    pub timezone: String,
}

fn non_empty_str<'a>(config: &'a Map<String, Value>, key: &str) -> DomainResult<Option<&'a str>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(DomainError::Configuration(format!("'{key}' must be a string, got {other}"))),
    }
}

impl ScheduleConfig {
    /// Parse and validate a schedule config.
    pub fn parse(config: &Value) -> DomainResult<Self> {
        let map = config
            .as_object()
            .ok_or_else(|| DomainError::Configuration("schedule config must be an object".to_string()))?;

        let cron_expression = non_empty_str(map, "cron_expression")?
            .ok_or_else(|| DomainError::Configuration("'cron_expression' is required".to_string()))?;
        validate_cron(cron_expression)?;

        let execution_type = non_empty_str(map, "execution_type")?
            .ok_or_else(|| DomainError::Configuration("'execution_type' is required".to_string()))?;
        let execution_type = ExecutionType::from_str(execution_type).ok_or_else(|| {
            DomainError::Configuration(format!(
                "'execution_type' must be 'agent' or 'workflow', got '{execution_type}'"
            ))
        })?;

        let agent_prompt = non_empty_str(map, "agent_prompt")?;
        let workflow_id = non_empty_str(map, "workflow_id")?;
        match (execution_type, agent_prompt, workflow_id) {
            (ExecutionType::Agent, Some(_), None) | (ExecutionType::Workflow, None, Some(_)) => {}
            (_, Some(_), Some(_)) => {
                return Err(DomainError::Configuration(
                    "'agent_prompt' and 'workflow_id' are mutually exclusive".to_string(),
                ))
            }
            (ExecutionType::Agent, None, _) => {
                return Err(DomainError::Configuration(
                    "'agent_prompt' is required when execution_type is 'agent'".to_string(),
                ))
            }
            (ExecutionType::Workflow, _, None) => {
                return Err(DomainError::Configuration(
                    "'workflow_id' is required when execution_type is 'workflow'".to_string(),
                ))
            }
        }

        let timezone = non_empty_str(map, "timezone")?.unwrap_or("UTC");
        parse_timezone(timezone)?;

        Ok(Self {
            cron_expression: cron_expression.to_string(),
            execution_type,
            agent_prompt: agent_prompt.map(str::to_string),
            workflow_id: workflow_id.map(str::to_string),
            workflow_input: map.get("workflow_input").filter(|v| !v.is_null()).cloned(),
            timezone: timezone.to_string(),
        })
    }

    /// Body the remote scheduler posts back on every tick.
    fn callback_payload(&self, trigger: &Trigger) -> Value {
        let mut payload = json!({
            "trigger_id": trigger.trigger_id(),
            "agent_id": trigger.agent_id(),
            "execution_type": self.execution_type.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        match self.execution_type {
            ExecutionType::Agent => {
                payload["agent_prompt"] = json!(self.agent_prompt);
            }
            ExecutionType::Workflow => {
                payload["workflow_id"] = json!(self.workflow_id);
                payload["workflow_input"] = self.workflow_input.clone().unwrap_or_else(|| json!({}));
            }
        }
        payload
    }
}

/// Registers triggers as remote cron schedules.
pub struct ScheduleTriggerProvider {
    provider_id: String,
    scheduler: Arc<dyn RemoteScheduler>,
    webhook_base_url: String,
    retries: u32,
    delay: Duration,
}

impl ScheduleTriggerProvider {
    /// Provider registered under `provider_id`.
    pub fn new(
        provider_id: impl Into<String>,
        scheduler: Arc<dyn RemoteScheduler>,
        webhook_base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            scheduler,
            webhook_base_url: webhook_base_url.into(),
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }

    /// Override delivery retries and delay.
    pub fn with_delivery(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.delay = delay;
        self
    }

    fn destination(&self, trigger: &Trigger) -> String {
        webhook_url(&self.webhook_base_url, trigger.trigger_id())
    }

    async fn schedules_for(&self, destination: &str) -> DomainResult<Vec<RemoteSchedule>> {
        Ok(self
            .scheduler
            .list_schedules()
            .await?
            .into_iter()
            .filter(|s| s.destination == destination)
            .collect())
    }

    /// Remove every remote schedule of this trigger: the stored handle, or
    /// anything pointing at its webhook URL if the handle was lost.
    async fn remove_schedules(&self, trigger: &Trigger) -> DomainResult<()> {
        if let Some(schedule_id) = trigger.config_str(SCHEDULE_ID_KEY) {
            return self.scheduler.delete_schedule(schedule_id).await;
        }
        let destination = self.destination(trigger);
        for schedule in self.schedules_for(&destination).await? {
            tracing::debug!(schedule_id = %schedule.schedule_id, "removing orphaned schedule");
            self.scheduler.delete_schedule(&schedule.schedule_id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerProvider for ScheduleTriggerProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn trigger_type(&self) -> TriggerType {
        TriggerType::Schedule
    }

    fn validate_config(&self, config: &Value) -> DomainResult<Value> {
        let parsed = ScheduleConfig::parse(config)?;
        let mut normalized = config.clone();
        normalized["timezone"] = json!(parsed.timezone);
        Ok(normalized)
    }

    async fn setup_trigger(&self, trigger: &mut Trigger) -> DomainResult<()> {
        let config = ScheduleConfig::parse(&Value::Object(trigger.config().clone()))?;
        let tz = parse_timezone(&config.timezone)?;

        self.remove_schedules(trigger)
            .await
            .map_err(|e| DomainError::ProviderSetup(format!("failed to clear previous schedule: {e}")))?;
        trigger.remove_config_value(SCHEDULE_ID_KEY);

        let utc_cron = convert_cron_to_utc(&config.cron_expression, tz, Utc::now());
        let request = ScheduleRequest {
            destination: self.destination(trigger),
            cron: utc_cron.clone(),
            body: config.callback_payload(trigger),
            headers: vec![("X-Trigger-Source".to_string(), "schedule".to_string())],
            retries: self.retries,
            delay: self.delay,
        };

        let schedule_id = self
            .scheduler
            .create_schedule(&request)
            .await
            .map_err(|e| DomainError::ProviderSetup(format!("failed to register schedule: {e}")))?;

        tracing::info!(
            trigger_id = %trigger.trigger_id(),
            %schedule_id,
            cron = %config.cron_expression,
            utc_cron = %utc_cron,
            timezone = %config.timezone,
            "schedule trigger registered"
        );
        trigger.set_config_value(SCHEDULE_ID_KEY, json!(schedule_id));
        Ok(())
    }

    async fn teardown_trigger(&self, trigger: &mut Trigger) -> DomainResult<()> {
        self.remove_schedules(trigger)
            .await
            .map_err(|e| DomainError::ProviderSetup(format!("failed to remove schedule: {e}")))?;
        trigger.remove_config_value(SCHEDULE_ID_KEY);
        tracing::info!(trigger_id = %trigger.trigger_id(), "schedule trigger removed");
        Ok(())
    }

    async fn process_event(&self, trigger: &Trigger, event: &TriggerEvent) -> DomainResult<TriggerResult> {
        let payload = &event.raw_data;
        let execution_type = payload
            .get("execution_type")
            .and_then(Value::as_str)
            .unwrap_or("agent");

        let mut variables = ExecutionVariables::new()
            .with("trigger_name", json!(trigger.name()))
            .with("execution_type", json!(execution_type));
        if let Some(timestamp) = payload.get("timestamp") {
            variables.insert("scheduled_at", timestamp.clone());
        }

        let result = match ExecutionType::from_str(execution_type) {
            Some(ExecutionType::Agent) => match payload.get("agent_prompt").and_then(Value::as_str) {
                Some(prompt) if !prompt.trim().is_empty() => TriggerResult::agent(prompt, variables),
                _ => TriggerResult::failed("scheduled agent execution is missing 'agent_prompt'"),
            },
            Some(ExecutionType::Workflow) => match payload.get("workflow_id").and_then(Value::as_str) {
                Some(workflow_id) if !workflow_id.trim().is_empty() => {
                    let input = payload.get("workflow_input").filter(|v| !v.is_null()).cloned();
                    TriggerResult::workflow(workflow_id, input, variables)?
                }
                _ => TriggerResult::failed("scheduled workflow execution is missing 'workflow_id'"),
            },
            None => TriggerResult::failed(format!("unknown execution_type '{execution_type}'")),
        };
        Ok(result)
    }

    async fn health_check(&self, trigger: &Trigger) -> bool {
        let healthy = match trigger.config_str(SCHEDULE_ID_KEY) {
            Some(schedule_id) => self
                .scheduler
                .get_schedule(schedule_id)
                .await
                .map(|s| s.is_some_and(|s| !s.is_paused)),
            None => self
                .schedules_for(&self.destination(trigger))
                .await
                .map(|found| found.iter().any(|s| !s.is_paused)),
        };
        healthy.unwrap_or_else(|e| {
            tracing::warn!(trigger_id = %trigger.trigger_id(), error = %e, "schedule health check failed");
            false
        })
    }
}
