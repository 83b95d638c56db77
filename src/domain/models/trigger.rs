//! Trigger domain model.
//!
//! A [`Trigger`] is the persistent configuration that causes an agent or
//! workflow to run when an external event occurs (a cron tick delivered by
//! the remote scheduler, or an inbound webhook). Providers turn each raw
//! occurrence ([`TriggerEvent`]) into a normalized [`TriggerResult`] that
//! the execution layer acts on.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Kind of external event a trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Cron tick delivered by the remote scheduler.
    Schedule,
    /// Inbound HTTP webhook.
    Webhook,
    /// Internal event; no built-in provider handles it yet.
    Event,
}

impl TriggerType {
    /// Stable identifier used in storage and over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Webhook => "webhook",
            Self::Event => "event",
        }
    }

    /// Parse the storage form produced by [`Self::as_str`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "schedule" => Some(Self::Schedule),
            "webhook" => Some(Self::Webhook),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identity of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerIdentity {
    /// Unique id of the trigger.
    pub trigger_id: Uuid,
    /// Agent the trigger starts runs for.
    pub agent_id: Uuid,
}

/// User-facing configuration of a trigger.
///
/// `config` is always a JSON object; its shape is owned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Display name; never empty.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    config: Map<String, Value>,
    is_active: bool,
}

impl TriggerConfig {
    /// Build a config. The config starts inactive; only
    /// [`Trigger::activate`] turns it on.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        config: Value,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::Configuration(
                "trigger name cannot be empty".to_string(),
            ));
        }
        let config = match config {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DomainError::Configuration(format!(
                    "trigger config must be a JSON object, got {other}"
                )))
            }
        };
        Ok(Self {
            name,
            description,
            config,
            is_active: false,
        })
    }

    /// Rehydrate a stored config, keeping the persisted activation state.
    pub fn restore(
        name: String,
        description: Option<String>,
        config: Map<String, Value>,
        is_active: bool,
    ) -> Self {
        Self {
            name,
            description,
            config,
            is_active,
        }
    }

    /// Provider-owned configuration map.
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// The config as a JSON value (for providers and serialization).
    pub fn config_value(&self) -> Value {
        Value::Object(self.config.clone())
    }

    /// Whether the trigger currently reacts to events.
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Creation and modification timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMetadata {
    /// When the trigger was created.
    pub created_at: DateTime<Utc>,
    /// Last change to config or activation state.
    pub updated_at: DateTime<Utc>,
}

impl TriggerMetadata {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persistent trigger bound to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    identity: TriggerIdentity,
    /// Id of the provider definition that owns this trigger.
    pub provider_id: String,
    /// Kind of event the trigger reacts to.
    pub trigger_type: TriggerType,
    config: TriggerConfig,
    /// Creation and modification timestamps.
    pub metadata: TriggerMetadata,
}

impl Trigger {
    /// Create a new, inactive trigger with a fresh id.
    pub fn new(
        agent_id: Uuid,
        provider_id: impl Into<String>,
        trigger_type: TriggerType,
        config: TriggerConfig,
    ) -> Self {
        Self {
            identity: TriggerIdentity {
                trigger_id: Uuid::new_v4(),
                agent_id,
            },
            provider_id: provider_id.into(),
            trigger_type,
            config,
            metadata: TriggerMetadata::now(),
        }
    }

    /// Rehydrate a trigger from storage.
    pub fn restore(
        identity: TriggerIdentity,
        provider_id: String,
        trigger_type: TriggerType,
        config: TriggerConfig,
        metadata: TriggerMetadata,
    ) -> Self {
        Self {
            identity,
            provider_id,
            trigger_type,
            config,
            metadata,
        }
    }

    /// Immutable id pair of the trigger.
    pub fn identity(&self) -> TriggerIdentity {
        self.identity
    }

    /// Trigger id.
    pub fn trigger_id(&self) -> Uuid {
        self.identity.trigger_id
    }

    /// Owning agent id.
    pub fn agent_id(&self) -> Uuid {
        self.identity.agent_id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }

    /// Full user-facing configuration.
    pub fn trigger_config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Provider-owned configuration map.
    pub fn config(&self) -> &Map<String, Value> {
        self.config.config()
    }

    /// String value of a provider config key, if present.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.config.get(key).and_then(Value::as_str)
    }

    /// Whether the trigger is active.
    pub fn is_active(&self) -> bool {
        self.config.is_active
    }

    /// Store provider bookkeeping (e.g. a remote schedule handle).
    pub fn set_config_value(&mut self, key: impl Into<String>, value: Value) {
        self.config.config.insert(key.into(), value);
        self.touch();
    }

    /// Remove provider bookkeeping; touches the trigger only when something was removed.
    pub fn remove_config_value(&mut self, key: &str) -> Option<Value> {
        let removed = self.config.config.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Replace name, description and provider config. Activation state is
    /// carried over untouched.
    pub fn update_config(&mut self, name: String, description: Option<String>, config: Value) -> DomainResult<()> {
        let mut next = TriggerConfig::new(name, description, config)?;
        next.is_active = self.config.is_active;
        self.config = next;
        self.touch();
        Ok(())
    }

    /// Returns false if the trigger was already active.
    pub fn activate(&mut self) -> bool {
        if self.config.is_active {
            return false;
        }
        self.config.is_active = true;
        self.touch();
        true
    }

    /// Returns false if the trigger was already inactive.
    pub fn deactivate(&mut self) -> bool {
        if !self.config.is_active {
            return false;
        }
        self.config.is_active = false;
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

/// One occurrence of an external event for a trigger. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Unique id of this delivery.
    pub event_id: Uuid,
    /// Trigger the event was delivered to.
    pub trigger_id: Uuid,
    /// Agent owning the trigger.
    pub agent_id: Uuid,
    /// Type copied from the trigger.
    pub trigger_type: TriggerType,
    /// Payload as received.
    pub raw_data: Value,
    /// Receipt time.
    pub timestamp: DateTime<Utc>,
}

impl TriggerEvent {
    /// Capture an inbound payload for `trigger`.
    pub fn new(trigger: &Trigger, raw_data: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            trigger_id: trigger.trigger_id(),
            agent_id: trigger.agent_id(),
            trigger_type: trigger.trigger_type,
            raw_data,
            timestamp: Utc::now(),
        }
    }
}

/// Insertion-ordered key/value bag handed to the execution layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ExecutionVariables(Vec<(String, Value)>);

impl ExecutionVariables {
    /// Empty variable set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable; replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder-style insert; replaces an existing key in place.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Value of a variable.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no variables are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variables as a JSON object, keys in insertion order.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().cloned().collect())
    }
}

impl Serialize for ExecutionVariables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl From<Map<String, Value>> for ExecutionVariables {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// Raw parts of a [`TriggerResult`], validated by [`TriggerResult::new`].
#[derive(Debug, Clone, Default)]
pub struct TriggerResultParts {
    /// Whether the provider produced a usable decision.
    pub success: bool,
    /// Start an agent run with `agent_prompt`.
    pub should_execute_agent: bool,
    /// Start the workflow named by `workflow_id`.
    pub should_execute_workflow: bool,
    /// Prompt for the agent path.
    pub agent_prompt: Option<String>,
    /// Workflow to run on the workflow path.
    pub workflow_id: Option<String>,
    /// Input handed to the workflow.
    pub workflow_input: Option<Value>,
    /// Variables extracted from the event.
    pub execution_variables: ExecutionVariables,
    /// Why the event could not be processed.
    pub error_message: Option<String>,
}

/// Normalized decision a provider returns to the execution layer.
///
/// Invariants (checked at construction):
/// - `success == false` requires a non-empty `error_message`;
/// - a successful result executes exactly one of agent or workflow;
/// - a workflow result carries a `workflow_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerResult {
    success: bool,
    should_execute_agent: bool,
    should_execute_workflow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_input: Option<Value>,
    execution_variables: ExecutionVariables,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TriggerResult {
    /// Validate `parts` into a result.
    pub fn new(parts: TriggerResultParts) -> DomainResult<Self> {
        if parts.success {
            if parts.should_execute_agent == parts.should_execute_workflow {
                return Err(DomainError::InvalidTriggerResult(
                    "a successful result must execute exactly one of agent or workflow".to_string(),
                ));
            }
            if parts.should_execute_workflow
                && parts.workflow_id.as_deref().map_or(true, |id| id.trim().is_empty())
            {
                return Err(DomainError::InvalidTriggerResult(
                    "workflow execution requires a workflow_id".to_string(),
                ));
            }
        } else {
            if parts.error_message.as_deref().map_or(true, |m| m.trim().is_empty()) {
                return Err(DomainError::InvalidTriggerResult(
                    "a failed result must carry an error_message".to_string(),
                ));
            }
            if parts.should_execute_agent || parts.should_execute_workflow {
                return Err(DomainError::InvalidTriggerResult(
                    "a failed result cannot request execution".to_string(),
                ));
            }
        }

        Ok(Self {
            success: parts.success,
            should_execute_agent: parts.should_execute_agent,
            should_execute_workflow: parts.should_execute_workflow,
            agent_prompt: parts.agent_prompt,
            workflow_id: parts.workflow_id,
            workflow_input: parts.workflow_input,
            execution_variables: parts.execution_variables,
            error_message: parts.error_message,
        })
    }

    /// Successful result that runs the agent with `prompt`.
    pub fn agent(prompt: impl Into<String>, variables: ExecutionVariables) -> Self {
        Self {
            success: true,
            should_execute_agent: true,
            should_execute_workflow: false,
            agent_prompt: Some(prompt.into()),
            workflow_id: None,
            workflow_input: None,
            execution_variables: variables,
            error_message: None,
        }
    }

    /// Successful result that runs a workflow.
    pub fn workflow(
        workflow_id: impl Into<String>,
        workflow_input: Option<Value>,
        variables: ExecutionVariables,
    ) -> DomainResult<Self> {
        Self::new(TriggerResultParts {
            success: true,
            should_execute_workflow: true,
            workflow_id: Some(workflow_id.into()),
            workflow_input,
            execution_variables: variables,
            ..Default::default()
        })
    }

    /// Failed result. An empty message is replaced so the invariant holds.
    pub fn failed(error_message: impl Into<String>) -> Self {
        let mut message = error_message.into();
        if message.trim().is_empty() {
            message = "unknown trigger error".to_string();
        }
        Self {
            success: false,
            should_execute_agent: false,
            should_execute_workflow: false,
            agent_prompt: None,
            workflow_id: None,
            workflow_input: None,
            execution_variables: ExecutionVariables::new(),
            error_message: Some(message),
        }
    }

    /// Whether the provider produced a usable decision.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Whether an agent run is requested.
    pub fn should_execute_agent(&self) -> bool {
        self.should_execute_agent
    }

    /// Whether a workflow run is requested.
    pub fn should_execute_workflow(&self) -> bool {
        self.should_execute_workflow
    }

    /// Prompt for the agent path.
    pub fn agent_prompt(&self) -> Option<&str> {
        self.agent_prompt.as_deref()
    }

    /// Workflow to run.
    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// Workflow input, if any.
    pub fn workflow_input(&self) -> Option<&Value> {
        self.workflow_input.as_ref()
    }

    /// Variables extracted from the event.
    pub fn execution_variables(&self) -> &ExecutionVariables {
        &self.execution_variables
    }

    /// Failure reason of an unsuccessful result.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Whether the result asks for any execution at all.
    pub fn requests_execution(&self) -> bool {
        self.success && (self.should_execute_agent || self.should_execute_workflow)
    }
}

/// Compile-time set of provider implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Remote cron schedule calling back into the webhook endpoint.
    Schedule,
    /// Payload mapping of inbound webhooks.
    Webhook,
}

impl ProviderKind {
    /// Built-in fallback for definitions that do not name a kind.
    pub fn for_trigger_type(trigger_type: TriggerType) -> Option<Self> {
        match trigger_type {
            TriggerType::Schedule => Some(Self::Schedule),
            TriggerType::Webhook => Some(Self::Webhook),
            TriggerType::Event => None,
        }
    }
}

/// Catalog entry describing a trigger provider. Loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// Catalog id, e.g. `schedule`.
    pub provider_id: String,
    /// Human-readable name.
    pub name: String,
    /// Short description shown in listings.
    pub description: String,
    /// Event type handled by the provider.
    pub trigger_type: TriggerType,
    /// JSON schema of the provider config.
    pub config_schema: Value,
    /// Whether the provider receives deliveries on the per-trigger webhook URL.
    pub webhook_enabled: bool,
    /// Implementation to instantiate; `None` falls back to `trigger_type`.
    pub kind: Option<ProviderKind>,
}
