//! Single entry point for inbound trigger events.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::execution_service::{ExecutionOutcome, ExecutionService};
use super::trigger_service::TriggerService;
use crate::domain::models::TriggerResult;

/// What happened to one inbound event.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    /// Trigger the payload was delivered to.
    pub trigger_id: Uuid,
    /// Logged event, when logging succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Provider decision.
    pub result: TriggerResult,
    /// Execution outcome, when one was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOutcome>,
}

impl DispatchOutcome {
    /// Whether the event was accepted and any requested execution started.
    pub fn success(&self) -> bool {
        self.result.success() && self.execution.as_ref().map_or(true, |e| e.success)
    }
}

/// Entry point for webhook deliveries and schedule callbacks.
pub struct TriggerDispatcher {
    triggers: Arc<TriggerService>,
    execution: Arc<ExecutionService>,
}

impl TriggerDispatcher {
    /// Build the dispatcher.
    pub fn new(triggers: Arc<TriggerService>, execution: Arc<ExecutionService>) -> Self {
        Self { triggers, execution }
    }

    /// Process the event and, when the result asks for it, start the
    /// execution and attach its outcome to the event log.
    pub async fn dispatch(&self, trigger_id: Uuid, payload: Value) -> DispatchOutcome {
        let processed = self.triggers.process_trigger_event(trigger_id, payload).await;

        let execution = match &processed.event {
            Some(event) if processed.result.requests_execution() => {
                let outcome = self
                    .execution
                    .execute_trigger_result(event.agent_id, &processed.result, event)
                    .await;
                self.triggers.record_execution(event.event_id, &outcome.to_json()).await;
                Some(outcome)
            }
            _ => None,
        };

        DispatchOutcome {
            trigger_id,
            event_id: processed.event.as_ref().map(|e| e.event_id),
            result: processed.result,
            execution,
        }
    }
}
