//! Execution run domain model.
//!
//! An [`ExecutionRun`] is one execution of an agent or workflow. Its status
//! only ever moves forward out of `running`; the terminal states are final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Durable status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Started and not yet finished.
    Running,
    /// Finished normally.
    Completed,
    /// Ended with an error, including instance shutdown.
    Failed,
    /// Stopped on request.
    Stopped,
}

impl RunStatus {
    /// Storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Parse the storage form.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of target a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTarget {
    /// Single agent run.
    Agent,
    /// Workflow run.
    Workflow,
}

/// Model selection and trigger linkage recorded on the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Model the run was started with.
    pub model_name: Option<String>,
    /// What the run executes.
    pub target: Option<RunTarget>,
    /// Trigger that started the run.
    pub trigger_id: Option<Uuid>,
    /// Trigger event that started the run.
    pub trigger_event_id: Option<Uuid>,
    /// Type of that trigger.
    pub trigger_type: Option<String>,
    /// Workflow id for workflow runs.
    pub workflow_id: Option<String>,
    /// Execution variables extracted by the provider.
    #[serde(default)]
    pub trigger_variables: Value,
}

/// One execution of an agent or workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRun {
    /// Run id.
    pub run_id: Uuid,
    /// Thread holding the run's conversation.
    pub thread_id: Uuid,
    /// Isolation container (project) the run's sandbox belongs to.
    pub project_id: Uuid,
    /// Agent executing the run.
    pub agent_id: Option<Uuid>,
    /// Current status; only moves forward.
    pub status: RunStatus,
    /// Error recorded when the run failed.
    pub error: Option<String>,
    /// Trigger and model details.
    pub metadata: RunMetadata,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Time the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRun {
    /// A freshly started run.
    pub fn start(thread_id: Uuid, project_id: Uuid, agent_id: Option<Uuid>, metadata: RunMetadata) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            thread_id,
            project_id,
            agent_id,
            status: RunStatus::Running,
            error: None,
            metadata,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Why a run is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// A caller asked for the run to stop.
    UserRequested,
    /// The owning process instance is shutting down.
    Shutdown,
}

impl StopCause {
    /// Storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequested => "user_requested",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_round_trip() {
        for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Failed, RunStatus::Stopped] {
            assert_eq!(RunStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::from_str("paused"), None);
    }

    #[test]
    fn test_only_running_is_non_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_start_is_running() {
        let run = ExecutionRun::start(Uuid::new_v4(), Uuid::new_v4(), None, RunMetadata::default());
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.completed_at.is_none());
    }
}
