//! Records exchanged with the execution collaborators: agent and workflow
//! catalogs, thread storage, sandboxes, billing, credential profiles and
//! the background runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stored agent configuration used to start a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent id.
    pub agent_id: Uuid,
    /// Account owning the agent.
    pub account_id: Uuid,
    /// Display name.
    pub name: String,
    /// System prompt handed to the runner.
    pub system_prompt: String,
    /// Preferred model; the execution default applies when unset.
    pub model: Option<String>,
    /// Free-form agent settings (tools, credential profiles, ...).
    #[serde(default)]
    pub config: Value,
}

impl AgentConfig {
    /// Credential profile names the agent declares under `credential_profiles`.
    pub fn credential_profile_names(&self) -> Vec<String> {
        self.config
            .get("credential_profiles")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Lifecycle of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being edited; cannot run.
    Draft,
    /// Runnable.
    Active,
    /// Temporarily disabled.
    Paused,
    /// Retired.
    Archived,
}

impl WorkflowStatus {
    /// Storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Archived => "archived",
        }
    }

    /// Parse the storage form.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// A workflow owned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow id.
    pub workflow_id: String,
    /// Agent the workflow belongs to.
    pub agent_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description; used as the seed prompt.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: WorkflowStatus,
    /// Initial prompt the workflow starts from.
    pub prompt: String,
}

impl Workflow {
    /// Whether the workflow may be started.
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}

/// Isolation container owning a sandbox and its threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project id.
    pub project_id: Uuid,
    /// Owning account.
    pub account_id: Uuid,
    /// Display name.
    pub name: String,
    /// Sandbox attached after provisioning.
    pub sandbox: Option<SandboxHandle>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Conversation thread a run writes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Thread id.
    pub thread_id: Uuid,
    /// Project the thread lives in.
    pub project_id: Uuid,
    /// Owning account.
    pub account_id: Uuid,
    /// Agent the thread talks to.
    pub agent_id: Option<Uuid>,
    /// Free-form metadata (trigger origin, variables).
    #[serde(default)]
    pub metadata: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message from the user or a trigger.
    User,
    /// Model output.
    Assistant,
    /// System instruction.
    System,
}

impl MessageRole {
    /// Storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Handle to a code-execution sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandle {
    /// Sandbox id used for teardown.
    pub sandbox_id: String,
    /// Access password.
    pub pass: String,
    /// VNC preview URL.
    pub vnc_preview: Option<String>,
    /// Sandbox HTTP URL.
    pub sandbox_url: Option<String>,
}

/// Outcome of the billing gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingStatus {
    /// Whether the account may start runs.
    pub ok: bool,
    /// Reason shown when denied.
    pub message: String,
    /// Subscription details, if known.
    pub subscription: Option<Value>,
}

impl BillingStatus {
    /// Status allowing execution.
    pub fn allowed() -> Self {
        Self {
            ok: true,
            message: "OK".to_string(),
            subscription: None,
        }
    }

    /// Status denying execution with `message`.
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            subscription: None,
        }
    }
}

/// A stored credential profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialProfile {
    /// Profile id.
    pub profile_id: Uuid,
    /// Owning account.
    pub account_id: Uuid,
    /// Profile name referenced by agent configs.
    pub name: String,
    /// Whether this is the account's default profile for `name`.
    pub is_default: bool,
    /// Provider-specific profile settings.
    #[serde(default)]
    pub config: Value,
}

/// Model parameters forwarded to the background runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Model to run.
    pub model_name: String,
    /// Enable extended thinking.
    pub enable_thinking: bool,
    /// Reasoning effort hint.
    pub reasoning_effort: String,
    /// Stream output to the response list.
    pub stream: bool,
    /// Enable the context manager.
    pub enable_context_manager: bool,
}

/// One unit of work for the background runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    /// Run to execute.
    pub run_id: Uuid,
    /// Thread holding the seed message.
    pub thread_id: Uuid,
    /// Instance that registered the run marker.
    pub instance_id: String,
    /// Project owning the sandbox.
    pub project_id: Uuid,
    /// Model parameters.
    pub model: ModelParams,
    /// Agent config with resolved credential profile ids.
    pub agent_config: Value,
    /// Execution variables from the trigger.
    #[serde(default)]
    pub trigger_variables: Value,
}
