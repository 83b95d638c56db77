//! Distributed stop protocol and instance markers for runs.
//!
//! Processes coordinate only through the [`ControlStore`]. Per run there is:
//! - a response list the runner appends to (`agent_run:{run}:responses`)
//! - a wake-up channel (`agent_run:{run}:new_response`)
//! - a global control channel (`agent_run:{run}:control`)
//! - one control channel per instance (`agent_run:{run}:control:{instance}`)
//!   addressed through `active_run:{instance}:{run}` marker keys

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RunStatus, StopCause};
use crate::domain::ports::{ControlStore, RunRepository};

/// Store key and channel names.
pub mod keys {
    use uuid::Uuid;

    /// List holding a run's response items.
    pub fn responses(run_id: Uuid) -> String {
        format!("agent_run:{run_id}:responses")
    }

    /// Channel announcing new response items.
    pub fn new_response_channel(run_id: Uuid) -> String {
        format!("agent_run:{run_id}:new_response")
    }

    /// Global stop channel of a run.
    pub fn control_channel(run_id: Uuid) -> String {
        format!("agent_run:{run_id}:control")
    }

    /// Stop channel of one instance watching a run.
    pub fn instance_control_channel(run_id: Uuid, instance_id: &str) -> String {
        format!("agent_run:{run_id}:control:{instance_id}")
    }

    /// Marker saying `instance_id` owns or watches `run_id`.
    pub fn active_run_marker(instance_id: &str, run_id: Uuid) -> String {
        format!("active_run:{instance_id}:{run_id}")
    }

    /// Pattern matching every instance's marker for one run.
    pub fn run_markers_pattern(run_id: Uuid) -> String {
        format!("active_run:*:{run_id}")
    }

    /// Pattern matching every marker of one instance.
    pub fn instance_markers_pattern(instance_id: &str) -> String {
        format!("active_run:{instance_id}:*")
    }

    /// Split a marker key into `(instance_id, run_id)`.
    pub fn parse_marker(key: &str) -> Option<(&str, Uuid)> {
        let rest = key.strip_prefix("active_run:")?;
        let (instance, run) = rest.rsplit_once(':')?;
        Some((instance, Uuid::parse_str(run).ok()?))
    }
}

/// Messages carried on control channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop the run.
    Stop,
    /// The run completed; end streams.
    EndStream,
    /// The run failed.
    Error,
}

impl ControlSignal {
    /// Wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::EndStream => "END_STREAM",
            Self::Error => "ERROR",
        }
    }

    /// Parse the wire form.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STOP" => Some(Self::Stop),
            "END_STREAM" => Some(Self::EndStream),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Run status a watcher reports when it receives this signal.
    pub fn terminal_status(&self) -> RunStatus {
        match self {
            Self::Stop => RunStatus::Stopped,
            Self::EndStream => RunStatus::Completed,
            Self::Error => RunStatus::Failed,
        }
    }
}

/// Result of a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopReport {
    /// Stopped run.
    pub run_id: Uuid,
    /// Status recorded for the run.
    pub status: RunStatus,
    /// Instances that had a marker for the run.
    pub instances: Vec<String>,
    /// Number of STOP messages published (global + per instance).
    pub publishes: usize,
}

/// Run control settings.
#[derive(Debug, Clone)]
pub struct RunControlSettings {
    /// This process instance.
    pub instance_id: String,
    /// TTL of active-run markers.
    pub marker_ttl: Duration,
    /// TTL of response lists.
    pub response_ttl: Duration,
}

/// Response lists, run markers and the stop protocol.
pub struct RunControl {
    store: Arc<dyn ControlStore>,
    runs: Arc<dyn RunRepository>,
    settings: RunControlSettings,
}

impl RunControl {
    /// Build the control plane for this instance.
    pub fn new(store: Arc<dyn ControlStore>, runs: Arc<dyn RunRepository>, settings: RunControlSettings) -> Self {
        Self { store, runs, settings }
    }

    /// This process instance.
    pub fn instance_id(&self) -> &str {
        &self.settings.instance_id
    }

    /// Underlying control store.
    pub fn store(&self) -> Arc<dyn ControlStore> {
        Arc::clone(&self.store)
    }

    /// Mark this instance as involved in `run_id`.
    pub async fn register_active_run(&self, run_id: Uuid) -> DomainResult<()> {
        let key = keys::active_run_marker(&self.settings.instance_id, run_id);
        self.store.set_with_ttl(&key, "running", self.settings.marker_ttl).await?;
        tracing::debug!(%run_id, instance_id = %self.settings.instance_id, "active run marker set");
        Ok(())
    }

    /// Remove this instance's marker for a run.
    pub async fn clear_active_run(&self, run_id: Uuid) -> DomainResult<()> {
        self.store
            .delete(&keys::active_run_marker(&self.settings.instance_id, run_id))
            .await
    }

    /// Append one output item, refresh the list TTL and wake watchers.
    pub async fn append_response(&self, run_id: Uuid, item: &Value) -> DomainResult<u64> {
        let key = keys::responses(run_id);
        let len = self.store.push(&key, &serde_json::to_string(item)?).await?;
        self.store.expire(&key, self.settings.response_ttl).await?;
        self.store.publish(&keys::new_response_channel(run_id), "new").await?;
        Ok(len)
    }

    /// Runner-side completion: persist the status, append a status item and
    /// signal watchers.
    pub async fn finish_run(&self, run_id: Uuid, status: RunStatus, error: Option<&str>) -> DomainResult<()> {
        let signal = match status {
            RunStatus::Completed => ControlSignal::EndStream,
            RunStatus::Failed => ControlSignal::Error,
            RunStatus::Stopped => ControlSignal::Stop,
            RunStatus::Running => {
                return Err(DomainError::ValidationFailed("finish_run needs a terminal status".to_string()))
            }
        };

        self.runs.update_status(run_id, status, error).await?;
        self.append_response(run_id, &json!({"type": "status", "status": status.as_str()}))
            .await?;
        self.store.publish(&keys::control_channel(run_id), signal.as_str()).await?;
        self.clear_active_run(run_id).await?;
        tracing::info!(%run_id, status = %status, "run finished");
        Ok(())
    }

    /// Stop a run from any process.
    ///
    /// The terminal status is persisted before anything is published. STOP
    /// then goes to the global channel and to the channel of every instance
    /// holding a marker, and the response list is deleted.
    pub async fn stop_run(&self, run_id: Uuid, cause: StopCause) -> DomainResult<StopReport> {
        let run = self.runs.get(run_id).await?.ok_or(DomainError::RunNotFound(run_id))?;

        let status = if run.status.is_terminal() {
            tracing::debug!(%run_id, status = %run.status, "run already terminal; signalling only");
            run.status
        } else {
            let (status, error) = match cause {
                StopCause::UserRequested => (RunStatus::Stopped, None),
                StopCause::Shutdown => (
                    RunStatus::Failed,
                    Some(format!("instance {} shut down", self.settings.instance_id)),
                ),
            };
            self.runs.update_status(run_id, status, error.as_deref()).await?;
            status
        };

        let stop = ControlSignal::Stop.as_str();
        self.store.publish(&keys::control_channel(run_id), stop).await?;
        let mut publishes = 1;

        let mut instances = Vec::new();
        for marker in self.store.keys_matching(&keys::run_markers_pattern(run_id)).await? {
            let Some((instance_id, _)) = keys::parse_marker(&marker) else {
                tracing::warn!(marker = %marker, "ignoring malformed run marker");
                continue;
            };
            self.store
                .publish(&keys::instance_control_channel(run_id, instance_id), stop)
                .await?;
            publishes += 1;
            instances.push(instance_id.to_string());
        }

        self.store.delete(&keys::responses(run_id)).await?;

        tracing::info!(
            %run_id,
            cause = cause.as_str(),
            status = %status,
            instances = instances.len(),
            "run stopped"
        );
        Ok(StopReport {
            run_id,
            status,
            instances,
            publishes,
        })
    }

    /// Stop every run this instance holds a marker for, with cause `shutdown`.
    pub async fn shutdown_instance(&self) -> Vec<StopReport> {
        let pattern = keys::instance_markers_pattern(&self.settings.instance_id);
        let markers = match self.store.keys_matching(&pattern).await {
            Ok(markers) => markers,
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate active runs at shutdown");
                return Vec::new();
            }
        };

        let mut reports = Vec::new();
        for marker in markers {
            let Some((_, run_id)) = keys::parse_marker(&marker) else { continue };
            match self.stop_run(run_id, StopCause::Shutdown).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(%run_id, error = %e, "failed to stop run at shutdown"),
            }
            if let Err(e) = self.clear_active_run(run_id).await {
                tracing::warn!(%run_id, error = %e, "failed to clear run marker");
            }
        }

        tracing::info!(
            instance_id = %self.settings.instance_id,
            stopped = reports.len(),
            "instance shutdown complete"
        );
        reports
    }
}
