//! Trigger provider port.
//!
//! A provider implements one trigger type: it validates configuration,
//! installs and removes the external side effect that will deliver events,
//! and maps each raw event to a [`TriggerResult`]. Providers never execute
//! anything themselves.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Trigger, TriggerEvent, TriggerResult, TriggerType};

/// One implementation of trigger semantics (schedule, webhook).
#[async_trait]
pub trait TriggerProvider: Send + Sync {
    /// Catalog id this provider was instantiated for.
    fn provider_id(&self) -> &str;

    /// Event type this provider handles.
    fn trigger_type(&self) -> TriggerType;

    /// Validate a config, returning it normalized (defaults filled in).
    /// Fails with [`DomainError::Configuration`](crate::domain::errors::DomainError::Configuration).
    fn validate_config(&self, config: &Value) -> DomainResult<Value>;

    /// Install the external side effect. Safe to call again for a trigger
    /// that is already set up. Any error aborts create/activate.
    async fn setup_trigger(&self, trigger: &mut Trigger) -> DomainResult<()>;

    /// Remove the external side effect. Must tolerate it being gone already.
    async fn teardown_trigger(&self, trigger: &mut Trigger) -> DomainResult<()>;

    /// Map one raw event to a result. Pure: no side effects.
    async fn process_event(&self, trigger: &Trigger, event: &TriggerEvent) -> DomainResult<TriggerResult>;

    /// Whether the external side effect is in place. Never fails.
    async fn health_check(&self, trigger: &Trigger) -> bool;
}
