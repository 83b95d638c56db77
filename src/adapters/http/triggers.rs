//! Trigger management and inbound webhook handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::caller::Caller;
use super::error::ApiResult;
use super::server::AppState;
use crate::domain::errors::DomainError;
use crate::domain::models::{ProviderDefinition, Trigger};
use crate::domain::ports::TriggerEventRecord;
use crate::services::{CreateTrigger, DispatchOutcome, TriggerUpdate};

/// Body of `POST /api/agents/{agent_id}/triggers`.
#[derive(Debug, Deserialize)]
pub struct CreateTriggerRequest {
    /// Provider id.
    pub provider_id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Provider config.
    #[serde(default)]
    pub config: Value,
}

/// Body of `PUT /api/triggers/{trigger_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTriggerRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New provider config.
    #[serde(default)]
    pub config: Option<Value>,
    /// New activation state.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Query of the events endpoint.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Trigger as returned by the API.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// Trigger id.
    pub trigger_id: Uuid,
    /// Owning agent.
    pub agent_id: Uuid,
    /// Provider id.
    pub provider_id: String,
    /// Trigger type.
    pub trigger_type: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Activation state.
    pub is_active: bool,
    /// Provider config.
    pub config: Value,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last update, RFC 3339.
    pub updated_at: String,
}

impl From<Trigger> for TriggerResponse {
    fn from(t: Trigger) -> Self {
        Self {
            trigger_id: t.trigger_id(),
            agent_id: t.agent_id(),
            provider_id: t.provider_id.clone(),
            trigger_type: t.trigger_type.as_str().to_string(),
            name: t.name().to_string(),
            description: t.description().map(str::to_string),
            is_active: t.is_active(),
            config: t.trigger_config().config_value(),
            created_at: t.metadata.created_at.to_rfc3339(),
            updated_at: t.metadata.updated_at.to_rfc3339(),
        }
    }
}

/// The caller must own the agent.
async fn authorize_agent(state: &AppState, caller: Caller, agent_id: Uuid) -> ApiResult<()> {
    let agent = state
        .agents
        .load_agent_config(agent_id)
        .await?
        .ok_or(DomainError::AgentNotFound(agent_id))?;
    if agent.account_id != caller.0 {
        return Err(DomainError::AccessDenied(format!("agent {agent_id} belongs to another account")).into());
    }
    Ok(())
}

async fn authorized_trigger(state: &AppState, caller: Caller, trigger_id: Uuid) -> ApiResult<Trigger> {
    let trigger = state
        .triggers
        .get_trigger(trigger_id)
        .await?
        .ok_or(DomainError::TriggerNotFound(trigger_id))?;
    authorize_agent(state, caller, trigger.agent_id()).await?;
    Ok(trigger)
}

/// `GET /api/triggers/providers`
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderDefinition>> {
    Json(state.triggers.list_provider_definitions().await)
}

/// `POST /api/agents/{agent_id}/triggers`
pub async fn create_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(agent_id): Path<Uuid>,
    Json(req): Json<CreateTriggerRequest>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    authorize_agent(&state, caller, agent_id).await?;
    let trigger = state
        .triggers
        .create(CreateTrigger {
            agent_id,
            provider_id: req.provider_id,
            name: req.name,
            description: req.description,
            config: req.config,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(trigger.into())))
}

/// `GET /api/agents/{agent_id}/triggers`
pub async fn list_agent_triggers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(agent_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TriggerResponse>>> {
    authorize_agent(&state, caller, agent_id).await?;
    let triggers = state.triggers.list_agent_triggers(agent_id).await?;
    Ok(Json(triggers.into_iter().map(TriggerResponse::from).collect()))
}

/// `GET /api/triggers/{trigger_id}`
pub async fn get_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
) -> ApiResult<Json<TriggerResponse>> {
    let trigger = authorized_trigger(&state, caller, trigger_id).await?;
    Ok(Json(trigger.into()))
}

/// `PUT /api/triggers/{trigger_id}`
pub async fn update_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
    Json(req): Json<UpdateTriggerRequest>,
) -> ApiResult<Json<TriggerResponse>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    let trigger = state
        .triggers
        .update(
            trigger_id,
            TriggerUpdate {
                name: req.name,
                description: req.description,
                config: req.config,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(Json(trigger.into()))
}

/// `DELETE /api/triggers/{trigger_id}`
pub async fn delete_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    state.triggers.delete(trigger_id).await?;
    Ok(Json(json!({"message": "Trigger deleted successfully"})))
}

/// `POST /api/triggers/{trigger_id}/activate`
pub async fn activate_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
) -> ApiResult<Json<TriggerResponse>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    Ok(Json(state.triggers.activate(trigger_id).await?.into()))
}

/// `POST /api/triggers/{trigger_id}/deactivate`
pub async fn deactivate_trigger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
) -> ApiResult<Json<TriggerResponse>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    Ok(Json(state.triggers.deactivate(trigger_id).await?.into()))
}

/// `GET /api/triggers/{trigger_id}/health`
pub async fn trigger_health(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    let healthy = state.triggers.health_check_trigger(trigger_id).await?;
    Ok(Json(json!({"trigger_id": trigger_id, "healthy": healthy})))
}

/// `GET /api/triggers/{trigger_id}/events`
pub async fn list_trigger_events(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(trigger_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<TriggerEventRecord>>> {
    authorized_trigger(&state, caller, trigger_id).await?;
    Ok(Json(state.triggers.list_events(trigger_id, query.limit).await?))
}

/// Inbound webhook or schedule callback. Unauthenticated; the trigger id in
/// the URL is the capability. Non-JSON bodies are wrapped as `{"raw": ...}`.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Path(trigger_id): Path<Uuid>,
    body: Bytes,
) -> Json<DispatchOutcome> {
    let payload = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&body)}))
    };
    Json(state.dispatcher.dispatch(trigger_id, payload).await)
}
