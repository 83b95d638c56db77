//! Trigger lifecycle orchestration.
//!
//! State machine: created (inactive) -> active <-> inactive -> deleted.
//! Every activation change runs the provider's setup or teardown, and a
//! trigger is only persisted once the provider side effect succeeded.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::provider_registry::ProviderRegistry;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProviderDefinition, Trigger, TriggerConfig, TriggerEvent, TriggerResult, TriggerType};
use crate::domain::ports::{
    TriggerEventLogRepository, TriggerEventRecord, TriggerProvider, TriggerRepository,
};

/// Input for [`TriggerService::create`].
#[derive(Debug, Clone)]
pub struct CreateTrigger {
    /// Agent the trigger belongs to.
    pub agent_id: Uuid,
    /// Provider definition id.
    pub provider_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Provider config.
    pub config: Value,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TriggerUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New provider config.
    pub config: Option<Value>,
    /// New activation state.
    pub is_active: Option<bool>,
}

/// Outcome of [`TriggerService::process_trigger_event`].
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEvent {
    /// Provider decision; failed when the trigger was missing or inactive.
    pub result: TriggerResult,
    /// The logged event; absent when the trigger could not be resolved.
    pub event: Option<TriggerEvent>,
}

impl ProcessedEvent {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            result: TriggerResult::failed(message),
            event: None,
        }
    }
}

fn setup_error(e: DomainError) -> DomainError {
    match e {
        DomainError::ProviderSetup(_) | DomainError::Configuration(_) => e,
        other => DomainError::ProviderSetup(other.to_string()),
    }
}

/// Trigger lifecycle and event processing.
pub struct TriggerService {
    registry: Arc<ProviderRegistry>,
    triggers: Arc<dyn TriggerRepository>,
    events: Arc<dyn TriggerEventLogRepository>,
}

impl TriggerService {
    /// Build the service.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        triggers: Arc<dyn TriggerRepository>,
        events: Arc<dyn TriggerEventLogRepository>,
    ) -> Self {
        Self {
            registry,
            triggers,
            events,
        }
    }

    async fn provider(&self, provider_id: &str) -> DomainResult<Arc<dyn TriggerProvider>> {
        self.registry
            .get_provider(provider_id)
            .await
            .ok_or_else(|| DomainError::ProviderNotFound(provider_id.to_string()))
    }

    async fn load(&self, trigger_id: Uuid) -> DomainResult<Trigger> {
        self.triggers
            .get(trigger_id)
            .await?
            .ok_or(DomainError::TriggerNotFound(trigger_id))
    }

    /// Validate, set up and persist a new active trigger.
    pub async fn create(&self, input: CreateTrigger) -> DomainResult<Trigger> {
        let provider = self.provider(&input.provider_id).await?;
        let config = provider.validate_config(&input.config)?;
        let trigger_config = TriggerConfig::new(input.name, input.description, config)?;

        let mut trigger = Trigger::new(input.agent_id, input.provider_id, provider.trigger_type(), trigger_config);
        trigger.activate();
        provider.setup_trigger(&mut trigger).await.map_err(setup_error)?;

        if let Err(e) = self.triggers.create(&trigger).await {
            if let Err(teardown) = provider.teardown_trigger(&mut trigger).await {
                tracing::warn!(
                    trigger_id = %trigger.trigger_id(),
                    error = %teardown,
                    "teardown after failed insert did not complete"
                );
            }
            return Err(e);
        }

        tracing::info!(
            trigger_id = %trigger.trigger_id(),
            agent_id = %trigger.agent_id(),
            provider_id = %trigger.provider_id,
            "trigger created"
        );
        Ok(trigger)
    }

    /// Apply an update. The old side effect is always torn down first
    /// (failures only logged); setup runs again if the trigger stays active.
    pub async fn update(&self, trigger_id: Uuid, update: TriggerUpdate) -> DomainResult<Trigger> {
        let mut trigger = self.load(trigger_id).await?;
        let provider = self.provider(&trigger.provider_id).await?;

        let validated = match &update.config {
            Some(config) => Some(provider.validate_config(config)?),
            None => None,
        };

        if let Err(e) = provider.teardown_trigger(&mut trigger).await {
            tracing::warn!(trigger_id = %trigger_id, error = %e, "teardown before update failed; continuing");
        }

        let config = match validated {
            Some(config) => config,
            None => provider.validate_config(&trigger.trigger_config().config_value())?,
        };
        let name = update.name.unwrap_or_else(|| trigger.name().to_string());
        let description = update.description.or_else(|| trigger.description().map(str::to_string));
        trigger.update_config(name, description, config)?;

        match update.is_active {
            Some(true) => {
                trigger.activate();
            }
            Some(false) => {
                trigger.deactivate();
            }
            None => {}
        }

        if trigger.is_active() {
            provider.setup_trigger(&mut trigger).await.map_err(setup_error)?;
        }

        self.triggers.update(&trigger).await?;
        tracing::info!(trigger_id = %trigger_id, active = trigger.is_active(), "trigger updated");
        Ok(trigger)
    }

    /// Activate; a no-op when already active.
    pub async fn activate(&self, trigger_id: Uuid) -> DomainResult<Trigger> {
        let mut trigger = self.load(trigger_id).await?;
        if !trigger.activate() {
            tracing::debug!(trigger_id = %trigger_id, "trigger already active");
            return Ok(trigger);
        }

        let provider = self.provider(&trigger.provider_id).await?;
        provider.setup_trigger(&mut trigger).await.map_err(setup_error)?;
        self.triggers.update(&trigger).await?;

        tracing::info!(trigger_id = %trigger_id, "trigger activated");
        Ok(trigger)
    }

    /// Deactivate; a no-op when already inactive. Teardown is best-effort.
    pub async fn deactivate(&self, trigger_id: Uuid) -> DomainResult<Trigger> {
        let mut trigger = self.load(trigger_id).await?;
        if !trigger.deactivate() {
            tracing::debug!(trigger_id = %trigger_id, "trigger already inactive");
            return Ok(trigger);
        }

        let provider = self.provider(&trigger.provider_id).await?;
        if let Err(e) = provider.teardown_trigger(&mut trigger).await {
            tracing::warn!(trigger_id = %trigger_id, error = %e, "teardown on deactivate failed");
        }
        self.triggers.update(&trigger).await?;

        tracing::info!(trigger_id = %trigger_id, "trigger deactivated");
        Ok(trigger)
    }

    /// Best-effort teardown, then hard delete.
    pub async fn delete(&self, trigger_id: Uuid) -> DomainResult<()> {
        let mut trigger = self.load(trigger_id).await?;

        match self.registry.get_provider(&trigger.provider_id).await {
            Some(provider) => {
                if let Err(e) = provider.teardown_trigger(&mut trigger).await {
                    tracing::warn!(trigger_id = %trigger_id, error = %e, "teardown on delete failed");
                }
            }
            None => tracing::warn!(
                trigger_id = %trigger_id,
                provider_id = %trigger.provider_id,
                "provider unavailable; deleting without teardown"
            ),
        }

        if !self.triggers.delete(trigger_id).await? {
            return Err(DomainError::TriggerNotFound(trigger_id));
        }
        tracing::info!(trigger_id = %trigger_id, "trigger deleted");
        Ok(())
    }

    /// Load a trigger.
    pub async fn get_trigger(&self, trigger_id: Uuid) -> DomainResult<Option<Trigger>> {
        self.triggers.get(trigger_id).await
    }

    /// Triggers of an agent.
    pub async fn list_agent_triggers(&self, agent_id: Uuid) -> DomainResult<Vec<Trigger>> {
        self.triggers.list_by_agent(agent_id).await
    }

    /// Active triggers of one type.
    pub async fn list_active_triggers_by_type(&self, trigger_type: TriggerType) -> DomainResult<Vec<Trigger>> {
        self.triggers.list_active_by_type(trigger_type).await
    }

    /// Registered provider definitions.
    pub async fn list_provider_definitions(&self) -> Vec<ProviderDefinition> {
        self.registry.list_definitions().await
    }

    /// Most recent events of a trigger, newest first.
    pub async fn list_events(&self, trigger_id: Uuid, limit: u32) -> DomainResult<Vec<TriggerEventRecord>> {
        self.events.list_for_trigger(trigger_id, limit).await
    }

    /// Whether the trigger's external side effect is in place. Inactive
    /// triggers are never healthy.
    pub async fn health_check_trigger(&self, trigger_id: Uuid) -> DomainResult<bool> {
        let trigger = self.load(trigger_id).await?;
        if !trigger.is_active() {
            return Ok(false);
        }
        Ok(match self.registry.get_provider(&trigger.provider_id).await {
            Some(provider) => provider.health_check(&trigger).await,
            None => false,
        })
    }

    /// Map a raw event to a result. Never fails: a missing or inactive
    /// trigger, or a provider error, yields a failed result.
    pub async fn process_trigger_event(&self, trigger_id: Uuid, raw_data: Value) -> ProcessedEvent {
        let trigger = match self.triggers.get(trigger_id).await {
            Ok(Some(trigger)) => trigger,
            Ok(None) => {
                tracing::warn!(trigger_id = %trigger_id, "event for unknown trigger");
                return ProcessedEvent::rejected(format!("trigger {trigger_id} not found"));
            }
            Err(e) => {
                tracing::warn!(trigger_id = %trigger_id, error = %e, "failed to load trigger for event");
                return ProcessedEvent::rejected(format!("failed to load trigger: {e}"));
            }
        };

        if !trigger.is_active() {
            tracing::info!(trigger_id = %trigger_id, "event for inactive trigger ignored");
            return ProcessedEvent::rejected(format!("trigger {trigger_id} is not active"));
        }

        let event = TriggerEvent::new(&trigger, raw_data);
        let result = match self.registry.get_provider(&trigger.provider_id).await {
            Some(provider) => provider.process_event(&trigger, &event).await.unwrap_or_else(|e| {
                tracing::warn!(trigger_id = %trigger_id, error = %e, "provider failed to process event");
                TriggerResult::failed(e.to_string())
            }),
            None => TriggerResult::failed(format!("provider '{}' is not available", trigger.provider_id)),
        };

        if let Err(e) = self.events.record(&TriggerEventRecord::new(&event, &result)).await {
            tracing::warn!(event_id = %event.event_id, error = %e, "failed to log trigger event");
        }

        tracing::info!(
            trigger_id = %trigger_id,
            event_id = %event.event_id,
            success = result.success(),
            "trigger event processed"
        );
        ProcessedEvent {
            result,
            event: Some(event),
        }
    }

    /// Attach an execution outcome to a logged event. Best-effort.
    pub async fn record_execution(&self, event_id: Uuid, execution: &Value) {
        if let Err(e) = self.events.record_execution(event_id, execution).await {
            tracing::warn!(event_id = %event_id, error = %e, "failed to record execution outcome");
        }
    }
}
