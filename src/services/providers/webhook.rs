//! Inbound webhook trigger.
//!
//! No external side effect: the trigger's URL exists as soon as the trigger
//! does. Events always run the agent; a webhook never starts a workflow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::template::{check_syntax, extract_path, render};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionVariables, Trigger, TriggerEvent, TriggerResult, TriggerType};
use crate::domain::ports::TriggerProvider;

/// Templates applied to webhook payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookTemplate {
    /// Prompt template with `{var}` placeholders.
    #[serde(default)]
    pub agent_prompt: Option<String>,
}

/// Webhook trigger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Variable name -> dot path into the payload.
    #[serde(default)]
    pub field_mappings: serde_json::Map<String, Value>,
    /// Prompt templates.
    #[serde(default)]
    pub template: WebhookTemplate,
}

impl WebhookConfig {
    /// Parse and validate a webhook config.
    pub fn parse(config: &Value) -> DomainResult<Self> {
        let parsed: Self = serde_json::from_value(config.clone())
            .map_err(|e| DomainError::Configuration(format!("invalid webhook config: {e}")))?;

        for (name, path) in &parsed.field_mappings {
            match path.as_str() {
                Some(p) if !p.trim().is_empty() => {}
                _ => {
                    return Err(DomainError::Configuration(format!(
                        "field_mappings.{name} must be a non-empty dot path"
                    )))
                }
            }
        }
        if let Some(template) = &parsed.template.agent_prompt {
            check_syntax(template)
                .map_err(|e| DomainError::Configuration(format!("invalid agent_prompt template: {e}")))?;
        }
        Ok(parsed)
    }

    fn variables_for(&self, payload: &Value) -> ExecutionVariables {
        let mut variables = ExecutionVariables::new();
        for (name, path) in &self.field_mappings {
            let Some(path) = path.as_str() else { continue };
            match extract_path(payload, path) {
                Some(value) => variables.insert(name.clone(), value.clone()),
                None => tracing::debug!(variable = %name, path, "webhook field not present in payload"),
            }
        }
        variables
    }
}

fn generic_prompt(payload: &Value) -> String {
    let body = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    format!("A webhook was received with the following payload. Process it accordingly.\n\n{body}")
}

/// Maps webhook payloads to agent runs.
#[derive(Debug, Clone)]
pub struct WebhookTriggerProvider {
    provider_id: String,
}

impl WebhookTriggerProvider {
    /// Provider registered under `provider_id`.
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }
}

#[async_trait]
impl TriggerProvider for WebhookTriggerProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn trigger_type(&self) -> TriggerType {
        TriggerType::Webhook
    }

    fn validate_config(&self, config: &Value) -> DomainResult<Value> {
        let config = if config.is_null() { json!({}) } else { config.clone() };
        WebhookConfig::parse(&config)?;
        let mut normalized = config;
        if normalized.get("field_mappings").is_none() {
            normalized["field_mappings"] = json!({});
        }
        Ok(normalized)
    }

    async fn setup_trigger(&self, _trigger: &mut Trigger) -> DomainResult<()> {
        Ok(())
    }

    async fn teardown_trigger(&self, _trigger: &mut Trigger) -> DomainResult<()> {
        Ok(())
    }

    async fn process_event(&self, trigger: &Trigger, event: &TriggerEvent) -> DomainResult<TriggerResult> {
        let payload = &event.raw_data;
        // Config was validated on write; a stored config that no longer
        // parses still produces an agent run with the generic prompt.
        let config = WebhookConfig::parse(&Value::Object(trigger.config().clone())).unwrap_or_else(|e| {
            tracing::warn!(trigger_id = %trigger.trigger_id(), error = %e, "stored webhook config invalid");
            WebhookConfig::default()
        });

        let variables = config.variables_for(payload);
        let prompt = match &config.template.agent_prompt {
            Some(template) => render(template, &variables).unwrap_or_else(|e| {
                tracing::warn!(trigger_id = %trigger.trigger_id(), error = %e, "webhook prompt render failed");
                generic_prompt(payload)
            }),
            None => generic_prompt(payload),
        };

        Ok(TriggerResult::agent(prompt, variables))
    }

    async fn health_check(&self, _trigger: &Trigger) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TriggerConfig;
    use uuid::Uuid;

    fn trigger(config: Value) -> Trigger {
        let config = TriggerConfig::new("hook", None, config).unwrap();
        Trigger::new(Uuid::new_v4(), "webhook", TriggerType::Webhook, config)
    }

    #[tokio::test]
    async fn test_scenario_mapping_and_template() {
        let provider = WebhookTriggerProvider::new("webhook");
        let t = trigger(json!({
            "field_mappings": {"user": "sender.name"},
            "template": {"agent_prompt": "Hello {user}"}
        }));
        let event = TriggerEvent::new(&t, json!({"sender": {"name": "Ada"}}));

        let result = provider.process_event(&t, &event).await.unwrap();

        assert_eq!(result.agent_prompt(), Some("Hello Ada"));
        assert_eq!(result.execution_variables().get("user"), Some(&json!("Ada")));
        assert!(result.should_execute_agent());
        assert!(!result.should_execute_workflow());
    }

    #[tokio::test]
    async fn test_render_failure_falls_back_to_payload_prompt() {
        let provider = WebhookTriggerProvider::new("webhook");
        let t = trigger(json!({
            "field_mappings": {"user": "sender.name"},
            "template": {"agent_prompt": "Hello {user}"}
        }));
        let event = TriggerEvent::new(&t, json!({"other": 1}));

        let result = provider.process_event(&t, &event).await.unwrap();

        let prompt = result.agent_prompt().unwrap();
        assert!(prompt.contains("\"other\": 1"));
        assert!(result.should_execute_agent());
    }

    #[tokio::test]
    async fn test_workflow_looking_config_still_runs_agent() {
        let provider = WebhookTriggerProvider::new("webhook");
        let t = trigger(json!({"execution_type": "workflow", "workflow_id": "wf-1"}));
        let event = TriggerEvent::new(&t, json!({"workflow_id": "wf-1"}));

        let result = provider.process_event(&t, &event).await.unwrap();

        assert!(result.should_execute_agent());
        assert!(!result.should_execute_workflow());
        assert_eq!(result.workflow_id(), None);
    }

    #[test]
    fn test_validate_rejects_bad_mappings_and_templates() {
        let provider = WebhookTriggerProvider::new("webhook");
        assert!(provider.validate_config(&json!({"field_mappings": {"x": 5}})).is_err());
        assert!(provider.validate_config(&json!({"template": {"agent_prompt": "Hi {user"}})).is_err());
        let normalized = provider.validate_config(&Value::Null).unwrap();
        assert_eq!(normalized["field_mappings"], json!({}));
    }

    #[tokio::test]
    async fn test_lifecycle_is_noop() {
        let provider = WebhookTriggerProvider::new("webhook");
        let mut t = trigger(json!({}));
        let before = t.clone();
        provider.setup_trigger(&mut t).await.unwrap();
        provider.teardown_trigger(&mut t).await.unwrap();
        assert_eq!(t, before);
        assert!(provider.health_check(&t).await);
    }
}
