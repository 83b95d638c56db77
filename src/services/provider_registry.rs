//! Provider definition catalog and provider factory.
//!
//! Definitions are registered once at startup. Provider instances are built
//! lazily from the closed set of [`ProviderKind`]s and cached per id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::providers::{ScheduleTriggerProvider, WebhookTriggerProvider};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProviderDefinition, ProviderKind, TriggerType};
use crate::domain::ports::{RemoteScheduler, TriggerProvider};

/// Dependencies handed to provider constructors.
#[derive(Clone)]
pub struct ProviderContext {
    /// Remote scheduler; schedule providers cannot be built without it.
    pub scheduler: Option<Arc<dyn RemoteScheduler>>,
    /// Base of per-trigger webhook URLs.
    pub webhook_base_url: String,
    /// Delivery retries asked of the scheduler.
    pub schedule_retries: u32,
    /// Delivery delay asked of the scheduler.
    pub schedule_delay: Duration,
}

impl ProviderContext {
    /// Context building webhook URLs under `webhook_base_url`.
    pub fn new(webhook_base_url: impl Into<String>) -> Self {
        Self {
            scheduler: None,
            webhook_base_url: webhook_base_url.into(),
            schedule_retries: 3,
            schedule_delay: Duration::from_secs(5),
        }
    }

    /// Enable the schedule provider.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn RemoteScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Override schedule delivery retries and delay.
    pub fn with_schedule_delivery(mut self, retries: u32, delay: Duration) -> Self {
        self.schedule_retries = retries;
        self.schedule_delay = delay;
        self
    }
}

/// Provider definitions and lazily built provider instances.
pub struct ProviderRegistry {
    context: ProviderContext,
    definitions: RwLock<HashMap<String, ProviderDefinition>>,
    providers: RwLock<HashMap<String, Arc<dyn TriggerProvider>>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new(context: ProviderContext) -> Self {
        Self {
            context,
            definitions: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry seeded with the built-in providers.
    pub async fn with_builtin_providers(context: ProviderContext) -> Self {
        let registry = Self::new(context);
        registry.load_builtin_providers().await;
        registry
    }

    /// Add or replace a definition. A cached instance for the id is dropped.
    pub async fn register_provider_definition(&self, definition: ProviderDefinition) {
        let provider_id = definition.provider_id.clone();
        self.providers.write().await.remove(&provider_id);
        self.definitions.write().await.insert(provider_id.clone(), definition);
        tracing::debug!(provider_id = %provider_id, "provider definition registered");
    }

    /// Definition registered under `provider_id`.
    pub async fn get_definition(&self, provider_id: &str) -> Option<ProviderDefinition> {
        self.definitions.read().await.get(provider_id).cloned()
    }

    /// Definitions sorted by id.
    pub async fn list_definitions(&self) -> Vec<ProviderDefinition> {
        let mut definitions: Vec<_> = self.definitions.read().await.values().cloned().collect();
        definitions.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        definitions
    }

    /// Provider for `provider_id`, built on first use. `None` when the id is
    /// unknown or the provider cannot be constructed.
    pub async fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn TriggerProvider>> {
        if let Some(provider) = self.providers.read().await.get(provider_id) {
            return Some(Arc::clone(provider));
        }

        let definition = self.get_definition(provider_id).await?;
        match self.instantiate(&definition) {
            Ok(provider) => {
                let mut providers = self.providers.write().await;
                let cached = providers
                    .entry(provider_id.to_string())
                    .or_insert_with(|| Arc::clone(&provider));
                Some(Arc::clone(cached))
            }
            Err(e) => {
                tracing::warn!(provider_id, error = %e, "failed to construct trigger provider");
                None
            }
        }
    }

    /// Every constructible provider handling `trigger_type`.
    pub async fn get_providers_by_type(&self, trigger_type: TriggerType) -> Vec<Arc<dyn TriggerProvider>> {
        let ids: Vec<String> = self
            .list_definitions()
            .await
            .into_iter()
            .filter(|d| d.trigger_type == trigger_type)
            .map(|d| d.provider_id)
            .collect();

        let mut providers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(provider) = self.get_provider(&id).await {
                providers.push(provider);
            }
        }
        providers
    }

    fn instantiate(&self, definition: &ProviderDefinition) -> DomainResult<Arc<dyn TriggerProvider>> {
        let kind = definition
            .kind
            .or_else(|| ProviderKind::for_trigger_type(definition.trigger_type))
            .ok_or_else(|| {
                DomainError::ProviderNotFound(format!(
                    "no implementation for trigger type '{}'",
                    definition.trigger_type
                ))
            })?;

        let provider: Arc<dyn TriggerProvider> = match kind {
            ProviderKind::Schedule => {
                let scheduler = self.context.scheduler.clone().ok_or_else(|| {
                    DomainError::Configuration("schedule triggers require a configured remote scheduler".to_string())
                })?;
                Arc::new(
                    ScheduleTriggerProvider::new(
                        definition.provider_id.clone(),
                        scheduler,
                        self.context.webhook_base_url.clone(),
                    )
                    .with_delivery(self.context.schedule_retries, self.context.schedule_delay),
                )
            }
            ProviderKind::Webhook => Arc::new(WebhookTriggerProvider::new(definition.provider_id.clone())),
        };
        Ok(provider)
    }

    /// Register the built-in `schedule` and `webhook` definitions.
    pub async fn load_builtin_providers(&self) {
        self.register_provider_definition(schedule_definition()).await;
        self.register_provider_definition(webhook_definition()).await;
    }
}

fn schedule_definition() -> ProviderDefinition {
    ProviderDefinition {
        provider_id: "schedule".to_string(),
        name: "Schedule".to_string(),
        description: "Run an agent or workflow on a cron schedule".to_string(),
        trigger_type: TriggerType::Schedule,
        config_schema: schedule_schema(),
        webhook_enabled: true,
        kind: Some(ProviderKind::Schedule),
    }
}

fn webhook_definition() -> ProviderDefinition {
    ProviderDefinition {
        provider_id: "webhook".to_string(),
        name: "Webhook".to_string(),
        description: "Run an agent when an HTTP request hits the trigger URL".to_string(),
        trigger_type: TriggerType::Webhook,
        config_schema: webhook_schema(),
        webhook_enabled: true,
        kind: Some(ProviderKind::Webhook),
    }
}

fn schedule_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cron_expression": {
                "type": "string",
                "description": "Five-field cron expression"
            },
            "execution_type": {
                "type": "string",
                "enum": ["agent", "workflow"]
            },
            "agent_prompt": {
                "type": "string",
                "description": "Prompt sent to the agent (execution_type = agent)"
            },
            "workflow_id": {
                "type": "string",
                "description": "Workflow to run (execution_type = workflow)"
            },
            "workflow_input": {
                "type": "object",
                "description": "Input passed to the workflow"
            },
            "timezone": {
                "type": "string",
                "description": "IANA timezone the cron expression is written in",
                "default": "UTC"
            }
        },
        "required": ["cron_expression", "execution_type"],
        "allOf": [
            {
                "if": {"properties": {"execution_type": {"const": "agent"}}},
                "then": {"required": ["agent_prompt"]}
            },
            {
                "if": {"properties": {"execution_type": {"const": "workflow"}}},
                "then": {"required": ["workflow_id"]}
            }
        ]
    })
}

fn webhook_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "field_mappings": {
                "type": "object",
                "description": "Variable name to dot path into the request body",
                "additionalProperties": {"type": "string"}
            },
            "template": {
                "type": "object",
                "properties": {
                    "agent_prompt": {
                        "type": "string",
                        "description": "Prompt template with {variable} placeholders"
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scheduler::MockScheduler;

    #[tokio::test]
    async fn test_builtins_resolve_and_cache() {
        let context = ProviderContext::new("http://localhost:8000").with_scheduler(Arc::new(MockScheduler::new()));
        let registry = ProviderRegistry::with_builtin_providers(context).await;

        let first = registry.get_provider("schedule").await.unwrap();
        let second = registry.get_provider("schedule").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.trigger_type(), TriggerType::Schedule);
        assert_eq!(registry.get_provider("webhook").await.unwrap().trigger_type(), TriggerType::Webhook);
    }

    #[tokio::test]
    async fn test_unknown_or_unbuildable_provider_is_none() {
        let registry = ProviderRegistry::with_builtin_providers(ProviderContext::new("http://localhost")).await;
        assert!(registry.get_provider("nope").await.is_none());
        // No scheduler configured.
        assert!(registry.get_provider("schedule").await.is_none());
        assert!(registry.get_provider("webhook").await.is_some());
    }

    #[tokio::test]
    async fn test_custom_definition_falls_back_to_trigger_type() {
        let registry = ProviderRegistry::new(ProviderContext::new("http://localhost"));
        registry
            .register_provider_definition(ProviderDefinition {
                provider_id: "github".to_string(),
                name: "GitHub".to_string(),
                description: "GitHub webhooks".to_string(),
                trigger_type: TriggerType::Webhook,
                config_schema: json!({}),
                webhook_enabled: true,
                kind: None,
            })
            .await;

        let provider = registry.get_provider("github").await.unwrap();
        assert_eq!(provider.provider_id(), "github");
        assert_eq!(registry.get_providers_by_type(TriggerType::Webhook).await.len(), 1);
        assert!(registry.get_providers_by_type(TriggerType::Event).await.is_empty());
    }
}
