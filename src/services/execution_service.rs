//! Turns a trigger result into a running agent or workflow execution.
//!
//! Every execution gets its own project (sandbox + thread), a run record in
//! `running` state and an instance marker, then is handed to the background
//! runner. Failures after the project exists delete it again.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::run_control::RunControl;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentConfig, ExecutionConfig, ExecutionRun, MessageRole, ModelParams, Project, RunJob,
    RunMetadata, RunStatus, RunTarget, TriggerEvent, TriggerResult, TriggerType,
};
use crate::domain::ports::{
    AgentCatalog, BackgroundRunner, BillingGate, ProfileStore, RunRepository, SandboxManager,
    ThreadStore, WorkflowCatalog,
};

/// Uniform result of an execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    /// Whether the run was started.
    pub success: bool,
    /// Thread created for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    /// Started run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Project created for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    /// Human-readable summary.
    pub message: String,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    fn started(started: &StartedRun, message: impl Into<String>) -> Self {
        Self {
            success: true,
            thread_id: Some(started.thread_id),
            run_id: Some(started.run_id),
            project_id: Some(started.project_id),
            message: message.into(),
            error: None,
        }
    }

    fn failed(error: &DomainError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            thread_id: None,
            run_id: None,
            project_id: None,
            message: message.into(),
            error: Some(error.to_string()),
        }
    }

    /// Outcome as JSON for the event log and API.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Model and runner defaults applied to every run.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Instance registering the run markers.
    pub instance_id: String,
    /// Model used when the agent names none.
    pub default_model: String,
    /// Enable extended thinking.
    pub enable_thinking: bool,
    /// Reasoning effort hint.
    pub reasoning_effort: String,
    /// Enable the context manager.
    pub enable_context_manager: bool,
}

impl ExecutionSettings {
    /// Settings from config for `instance_id`.
    pub fn from_config(config: &ExecutionConfig, instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            default_model: config.default_model.clone(),
            enable_thinking: config.enable_thinking,
            reasoning_effort: config.reasoning_effort.clone(),
            enable_context_manager: config.enable_context_manager,
        }
    }
}

/// Collaborators the execution service drives.
#[derive(Clone)]
pub struct ExecutionDeps {
    /// Agent lookup.
    pub agents: Arc<dyn AgentCatalog>,
    /// Workflow lookup.
    pub workflows: Arc<dyn WorkflowCatalog>,
    /// Projects, threads and messages.
    pub threads: Arc<dyn ThreadStore>,
    /// Sandbox provisioning.
    pub sandboxes: Arc<dyn SandboxManager>,
    /// Billing gate.
    pub billing: Arc<dyn BillingGate>,
    /// Credential profiles.
    pub profiles: Arc<dyn ProfileStore>,
    /// Background runner queue.
    pub runner: Arc<dyn BackgroundRunner>,
    /// Run records.
    pub runs: Arc<dyn RunRepository>,
}

#[derive(Debug, Clone, Copy)]
struct StartedRun {
    project_id: Uuid,
    thread_id: Uuid,
    run_id: Uuid,
}

/// What to start once the target has been resolved.
struct RunPlan {
    target: RunTarget,
    workflow_id: Option<String>,
    seed_message: String,
}

/// Turns trigger results into provisioned, queued runs.
pub struct ExecutionService {
    deps: ExecutionDeps,
    control: Arc<RunControl>,
    settings: ExecutionSettings,
}

impl ExecutionService {
    /// Build the service.
    pub fn new(deps: ExecutionDeps, control: Arc<RunControl>, settings: ExecutionSettings) -> Self {
        Self {
            deps,
            control,
            settings,
        }
    }

    /// Start the execution a trigger result asks for. Never fails; errors are
    /// reported in the outcome.
    pub async fn execute_trigger_result(
        &self,
        agent_id: Uuid,
        result: &TriggerResult,
        event: &TriggerEvent,
    ) -> ExecutionOutcome {
        if !result.requests_execution() {
            let error = DomainError::InvalidTriggerResult(
                result
                    .error_message()
                    .unwrap_or("result does not request an execution")
                    .to_string(),
            );
            return ExecutionOutcome::failed(&error, "Nothing to execute");
        }

        let workflow = result.should_execute_workflow() && event.trigger_type != TriggerType::Webhook;
        if result.should_execute_workflow() && !workflow {
            tracing::warn!(
                trigger_id = %event.trigger_id,
                "webhook result asked for a workflow; running the agent instead"
            );
        }

        let outcome = if workflow {
            match result.workflow_id() {
                Some(workflow_id) => self.execute_workflow(agent_id, workflow_id, result, event).await,
                None => Err(DomainError::InvalidTriggerResult("missing workflow_id".to_string())),
            }
        } else {
            self.execute_agent(agent_id, result, event).await
        };

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    %agent_id,
                    trigger_id = %event.trigger_id,
                    error = %e,
                    "trigger execution failed"
                );
                ExecutionOutcome::failed(&e, "Failed to start execution")
            }
        }
    }

    async fn execute_agent(
        &self,
        agent_id: Uuid,
        result: &TriggerResult,
        event: &TriggerEvent,
    ) -> DomainResult<ExecutionOutcome> {
        let agent = self.load_agent(agent_id).await?;
        let prompt = result
            .agent_prompt()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Trigger event received: {}", event.raw_data));

        let plan = RunPlan {
            target: RunTarget::Agent,
            workflow_id: None,
            seed_message: prompt,
        };
        let started = self.start_run(&agent, plan, result, event).await?;
        Ok(ExecutionOutcome::started(
            &started,
            format!("Agent '{}' execution started", agent.name),
        ))
    }

    async fn execute_workflow(
        &self,
        agent_id: Uuid,
        workflow_id: &str,
        result: &TriggerResult,
        event: &TriggerEvent,
    ) -> DomainResult<ExecutionOutcome> {
        let workflow = self
            .deps
            .workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| DomainError::WorkflowNotFound(workflow_id.to_string()))?;
        if !workflow.is_active() {
            return Err(DomainError::WorkflowInactive(workflow_id.to_string()));
        }

        let agent = self.load_agent(agent_id).await?;
        let input = result.workflow_input().cloned().unwrap_or_else(|| json!({}));
        let plan = RunPlan {
            target: RunTarget::Workflow,
            workflow_id: Some(workflow.workflow_id.clone()),
            seed_message: workflow_seed_message(&workflow.prompt, &input),
        };
        let started = self.start_run(&agent, plan, result, event).await?;
        Ok(ExecutionOutcome::started(
            &started,
            format!("Workflow '{}' execution started", workflow.name),
        ))
    }

    async fn load_agent(&self, agent_id: Uuid) -> DomainResult<AgentConfig> {
        self.deps
            .agents
            .load_agent_config(agent_id)
            .await?
            .ok_or(DomainError::AgentNotFound(agent_id))
    }

    async fn start_run(
        &self,
        agent: &AgentConfig,
        plan: RunPlan,
        result: &TriggerResult,
        event: &TriggerEvent,
    ) -> DomainResult<StartedRun> {
        let billing = self.deps.billing.check_billing_status(agent.account_id).await?;
        if !billing.ok {
            return Err(DomainError::BillingDenied(billing.message));
        }

        let project_name = format!("Trigger: {} - {}", agent.name, event.timestamp.format("%Y-%m-%d %H:%M"));
        let project = self.deps.threads.create_project(agent.account_id, &project_name).await?;
        tracing::debug!(project_id = %project.project_id, "execution project created");

        let mut sandbox_id = None;
        match self.provision(agent, &project, plan, result, event, &mut sandbox_id).await {
            Ok(started) => Ok(started),
            Err(e) => {
                self.cleanup(&project, sandbox_id.as_deref()).await;
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        agent: &AgentConfig,
        project: &Project,
        plan: RunPlan,
        result: &TriggerResult,
        event: &TriggerEvent,
        sandbox_id: &mut Option<String>,
    ) -> DomainResult<StartedRun> {
        let pass = Uuid::new_v4().to_string();
        let sandbox = self.deps.sandboxes.create_sandbox(&pass, project.project_id).await?;
        *sandbox_id = Some(sandbox.sandbox_id.clone());
        self.deps.threads.attach_sandbox(project.project_id, &sandbox).await?;

        let thread_metadata = json!({
            "is_agent_builder": false,
            "trigger_execution": true,
            "trigger_id": event.trigger_id,
            "trigger_type": event.trigger_type.as_str(),
            "workflow_id": plan.workflow_id,
        });
        let thread = self
            .deps
            .threads
            .create_thread(project.project_id, agent.account_id, Some(agent.agent_id), thread_metadata)
            .await?;
        self.deps
            .threads
            .add_message(thread.thread_id, MessageRole::User, &plan.seed_message)
            .await?;

        let model_name = agent.model.clone().unwrap_or_else(|| self.settings.default_model.clone());
        let trigger_variables = result.execution_variables().to_json();
        let metadata = RunMetadata {
            model_name: Some(model_name.clone()),
            target: Some(plan.target),
            trigger_id: Some(event.trigger_id),
            trigger_event_id: Some(event.event_id),
            trigger_type: Some(event.trigger_type.as_str().to_string()),
            workflow_id: plan.workflow_id.clone(),
            trigger_variables: trigger_variables.clone(),
        };
        let run = ExecutionRun::start(thread.thread_id, project.project_id, Some(agent.agent_id), metadata);
        self.deps.runs.insert(&run).await?;

        let started = StartedRun {
            project_id: project.project_id,
            thread_id: thread.thread_id,
            run_id: run.run_id,
        };

        let job = RunJob {
            run_id: run.run_id,
            thread_id: thread.thread_id,
            instance_id: self.settings.instance_id.clone(),
            project_id: project.project_id,
            model: ModelParams {
                model_name,
                enable_thinking: self.settings.enable_thinking,
                reasoning_effort: self.settings.reasoning_effort.clone(),
                stream: true,
                enable_context_manager: self.settings.enable_context_manager,
            },
            agent_config: self.runner_agent_config(agent).await,
            trigger_variables,
        };

        self.control.register_active_run(run.run_id).await?;
        if let Err(e) = self.deps.runner.enqueue(job).await {
            if let Err(clear) = self.control.clear_active_run(run.run_id).await {
                tracing::warn!(run_id = %run.run_id, error = %clear, "failed to clear run marker");
            }
            if let Err(update) = self
                .deps
                .runs
                .update_status(run.run_id, RunStatus::Failed, Some(&e.to_string()))
                .await
            {
                tracing::warn!(run_id = %run.run_id, error = %update, "failed to mark run as failed");
            }
            return Err(e);
        }

        tracing::info!(
            agent_id = %agent.agent_id,
            run_id = %run.run_id,
            thread_id = %thread.thread_id,
            target = ?plan.target,
            "execution started"
        );
        Ok(started)
    }

    /// Agent config handed to the runner, with resolved credential profiles.
    async fn runner_agent_config(&self, agent: &AgentConfig) -> Value {
        let mut profiles = serde_json::Map::new();
        for name in agent.credential_profile_names() {
            match self.deps.profiles.get_default_profile(agent.account_id, &name).await {
                Ok(Some(profile)) => {
                    profiles.insert(name, json!(profile.profile_id));
                }
                Ok(None) => tracing::warn!(agent_id = %agent.agent_id, profile = %name, "credential profile not found"),
                Err(e) => tracing::warn!(
                    agent_id = %agent.agent_id,
                    profile = %name,
                    error = %e,
                    "failed to resolve credential profile"
                ),
            }
        }

        json!({
            "agent_id": agent.agent_id,
            "account_id": agent.account_id,
            "name": agent.name,
            "system_prompt": agent.system_prompt,
            "model": agent.model,
            "config": agent.config,
            "credential_profiles": profiles,
        })
    }

    async fn cleanup(&self, project: &Project, sandbox_id: Option<&str>) {
        if let Some(sandbox_id) = sandbox_id {
            if let Err(e) = self.deps.sandboxes.delete_sandbox(sandbox_id).await {
                tracing::warn!(sandbox_id, error = %e, "failed to delete sandbox after failed execution");
            }
        }
        if let Err(e) = self.deps.threads.delete_project(project.project_id).await {
            tracing::warn!(project_id = %project.project_id, error = %e, "failed to delete project after failed execution");
        } else {
            tracing::info!(project_id = %project.project_id, "partially created project removed");
        }
    }
}

fn workflow_seed_message(prompt: &str, input: &Value) -> String {
    let rendered = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
    format!("{prompt}\n\n<workflow_input>\n{rendered}\n</workflow_input>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_seed_message_tags_input() {
        let message = workflow_seed_message("Summarize the inbox", &json!({"folder": "inbox"}));
        assert!(message.starts_with("Summarize the inbox"));
        assert!(message.contains("<workflow_input>"));
        assert!(message.contains("\"folder\": \"inbox\""));
        assert!(message.ends_with("</workflow_input>"));
    }

    #[test]
    fn test_failed_outcome_serializes_without_ids() {
        let outcome = ExecutionOutcome::failed(&DomainError::BillingDenied("quota".into()), "nope");
        let value = outcome.to_json();
        assert_eq!(value["success"], json!(false));
        assert!(value.get("run_id").is_none());
        assert_eq!(value["error"], json!("Billing check failed: quota"));
    }
}
