//! Run status, streaming and stop handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Json;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use uuid::Uuid;

use super::caller::Caller;
use super::error::ApiResult;
use super::server::AppState;
use crate::domain::errors::DomainError;
use crate::domain::models::{ExecutionRun, StopCause};

/// Load a run whose thread belongs to the caller.
async fn authorized_run(state: &AppState, caller: Caller, run_id: Uuid) -> ApiResult<ExecutionRun> {
    let run = state.runs.get(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?;
    let thread = state
        .threads
        .get_thread(run.thread_id)
        .await?
        .ok_or(DomainError::ThreadNotFound(run.thread_id))?;
    if thread.account_id != caller.0 {
        return Err(DomainError::AccessDenied(format!("run {run_id} belongs to another account")).into());
    }
    Ok(run)
}

/// `GET /api/agent-runs/{run_id}`
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<ExecutionRun>> {
    Ok(Json(authorized_run(&state, caller, run_id).await?))
}

/// SSE stream of a run's output items, one JSON object per `data:` line.
pub async fn stream_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    authorized_run(&state, caller, run_id).await?;
    tracing::debug!(%run_id, "run stream opened");

    let stream = state
        .streamer
        .stream(run_id)
        .map(|item| Ok(Event::default().data(item.to_string())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.heartbeat_interval)))
}

/// `POST /api/agent-runs/{run_id}/stop`
pub async fn stop_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(run_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    authorized_run(&state, caller, run_id).await?;
    let report = state.control.stop_run(run_id, StopCause::UserRequested).await?;
    tracing::info!(%run_id, publishes = report.publishes, "stop requested over HTTP");
    Ok(Json(json!({"status": "stopped"})))
}
