mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{count_rows, seed_agent, INSTANCE_ID};
use runwire::adapters::control::MemoryControlStore;
use runwire::adapters::local::{AllowAllBillingGate, LocalSandboxManager, QueueBackgroundRunner, RUNNER_QUEUE_KEY};
use runwire::adapters::sqlite::{
    create_migrated_test_pool, SqliteCatalogRepository, SqliteProfileRepository, SqliteRunRepository,
    SqliteThreadRepository,
};
use runwire::domain::errors::{DomainError, DomainResult};
use runwire::domain::models::{
    AgentConfig, BillingStatus, CredentialProfile, ExecutionConfig, ExecutionVariables, MessageRole, RunJob,
    RunStatus, RunTarget, Trigger, TriggerConfig, TriggerEvent, TriggerResult, TriggerType, Workflow,
    WorkflowStatus,
};
use runwire::domain::ports::{BackgroundRunner, BillingGate, ControlStore, RunRepository, ThreadStore};
use runwire::services::run_control::keys;
use runwire::services::{ExecutionDeps, ExecutionService, ExecutionSettings, RunControl, RunControlSettings};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

struct DenyingBillingGate;

#[async_trait]
impl BillingGate for DenyingBillingGate {
    async fn check_billing_status(&self, _account_id: Uuid) -> DomainResult<BillingStatus> {
        Ok(BillingStatus::denied("Monthly usage limit reached"))
    }
}

struct FailingRunner;

#[async_trait]
impl BackgroundRunner for FailingRunner {
    async fn enqueue(&self, _job: RunJob) -> DomainResult<()> {
        Err(DomainError::ExternalService("runner queue unavailable".to_string()))
    }
}

struct Fixture {
    pool: SqlitePool,
    store: Arc<MemoryControlStore>,
    sandboxes: LocalSandboxManager,
    catalog: SqliteCatalogRepository,
    threads: SqliteThreadRepository,
    runs: SqliteRunRepository,
    service: ExecutionService,
}

async fn fixture_with(billing: Arc<dyn BillingGate>, runner: Option<Arc<dyn BackgroundRunner>>) -> Fixture {
    let pool = create_migrated_test_pool().await.unwrap();
    let store = Arc::new(MemoryControlStore::new());
    let sandboxes = LocalSandboxManager::new();
    let catalog = SqliteCatalogRepository::new(pool.clone());
    let threads = SqliteThreadRepository::new(pool.clone());
    let runs = SqliteRunRepository::new(pool.clone());

    let control = Arc::new(RunControl::new(
        store.clone(),
        Arc::new(runs.clone()),
        RunControlSettings {
            instance_id: INSTANCE_ID.to_string(),
            marker_ttl: Duration::from_secs(60),
            response_ttl: Duration::from_secs(60),
        },
    ));

    let runner: Arc<dyn BackgroundRunner> = match runner {
        Some(runner) => runner,
        None => Arc::new(QueueBackgroundRunner::new(store.clone())),
    };
    let service = ExecutionService::new(
        ExecutionDeps {
            agents: Arc::new(catalog.clone()),
            workflows: Arc::new(catalog.clone()),
            threads: Arc::new(threads.clone()),
            sandboxes: Arc::new(sandboxes.clone()),
            billing,
            profiles: Arc::new(SqliteProfileRepository::new(pool.clone())),
            runner,
            runs: Arc::new(runs.clone()),
        },
        control,
        ExecutionSettings::from_config(&ExecutionConfig::default(), INSTANCE_ID),
    );

    Fixture {
        pool,
        store,
        sandboxes,
        catalog,
        threads,
        runs,
        service,
    }
}

async fn fixture() -> Fixture {
    fixture_with(Arc::new(AllowAllBillingGate), None).await
}

fn event_for(agent: &AgentConfig, trigger_type: TriggerType, raw: serde_json::Value) -> TriggerEvent {
    let config = TriggerConfig::new("Test trigger", None, json!({})).unwrap();
    let provider_id = match trigger_type {
        TriggerType::Webhook => "webhook",
        _ => "schedule",
    };
    let trigger = Trigger::new(agent.agent_id, provider_id, trigger_type, config);
    TriggerEvent::new(&trigger, raw)
}

#[tokio::test]
async fn test_billing_denial_creates_nothing() {
    let f = fixture_with(Arc::new(DenyingBillingGate), None).await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let event = event_for(&agent, TriggerType::Schedule, json!({}));

    let outcome = f
        .service
        .execute_trigger_result(agent.agent_id, &TriggerResult::agent("Do it", ExecutionVariables::new()), &event)
        .await;

    assert!(!outcome.success);
    assert!(outcome.run_id.is_none());
    assert!(outcome.error.unwrap().contains("Monthly usage limit reached"));
    assert_eq!(count_rows(&f.pool, "projects").await, 0);
    assert_eq!(count_rows(&f.pool, "agent_runs").await, 0);
    assert_eq!(f.sandboxes.live_sandboxes().await, 0);
    assert!(f.store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_agent_execution_provisions_run() {
    let f = fixture().await;
    let account_id = Uuid::new_v4();
    let agent = seed_agent(&f.catalog, account_id).await;
    let profile = CredentialProfile {
        profile_id: Uuid::new_v4(),
        account_id,
        name: "gmail".to_string(),
        is_default: true,
        config: json!({"scopes": ["read"]}),
    };
    SqliteProfileRepository::new(f.pool.clone()).insert(&profile).await.unwrap();

    let variables = ExecutionVariables::new().with("sender", json!("ada@example.com"));
    let event = event_for(&agent, TriggerType::Webhook, json!({"from": "ada@example.com"}));
    let outcome = f
        .service
        .execute_trigger_result(agent.agent_id, &TriggerResult::agent("Reply to Ada", variables), &event)
        .await;

    assert!(outcome.success, "{outcome:?}");
    let run_id = outcome.run_id.unwrap();
    let thread_id = outcome.thread_id.unwrap();
    let project_id = outcome.project_id.unwrap();

    let project = f.threads.get_project(project_id).await.unwrap().expect("project");
    assert!(project.name.starts_with("Trigger: Inbox triage - "));
    assert!(project.sandbox.is_some());
    assert_eq!(f.sandboxes.live_sandboxes().await, 1);

    let thread = f.threads.get_thread(thread_id).await.unwrap().expect("thread");
    assert_eq!(thread.account_id, account_id);
    assert_eq!(thread.metadata["trigger_execution"], json!(true));
    assert_eq!(thread.metadata["trigger_id"], json!(event.trigger_id));

    let messages = f.threads.list_messages(thread_id).await.unwrap();
    assert_eq!(messages, vec![(MessageRole::User, "Reply to Ada".to_string())]);

    let run = f.runs.get(run_id).await.unwrap().expect("run");
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.thread_id, thread_id);
    assert_eq!(run.metadata.target, Some(RunTarget::Agent));
    assert_eq!(run.metadata.trigger_event_id, Some(event.event_id));
    assert_eq!(run.metadata.trigger_variables["sender"], json!("ada@example.com"));
    assert_eq!(run.metadata.model_name.as_deref(), Some("anthropic/claude-sonnet-4"));

    let marker = keys::active_run_marker(INSTANCE_ID, run_id);
    assert_eq!(f.store.keys_matching(&marker).await.unwrap().len(), 1);

    let jobs = f.store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job: RunJob = serde_json::from_str(&jobs[0]).unwrap();
    assert_eq!(job.run_id, run_id);
    assert_eq!(job.thread_id, thread_id);
    assert!(job.model.stream);
    assert_eq!(job.agent_config["credential_profiles"]["gmail"], json!(profile.profile_id));
    assert_eq!(job.trigger_variables["sender"], json!("ada@example.com"));
}

#[tokio::test]
async fn test_missing_credential_profile_is_skipped() {
    let f = fixture().await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let event = event_for(&agent, TriggerType::Schedule, json!({}));

    let outcome = f
        .service
        .execute_trigger_result(agent.agent_id, &TriggerResult::agent("Go", ExecutionVariables::new()), &event)
        .await;
    assert!(outcome.success);

    let jobs = f.store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap();
    let job: RunJob = serde_json::from_str(&jobs[0]).unwrap();
    assert_eq!(job.agent_config["credential_profiles"], json!({}));
}

#[tokio::test]
async fn test_schedule_workflow_result_runs_workflow() {
    let f = fixture().await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let workflow = Workflow {
        workflow_id: "wf-digest".to_string(),
        agent_id: agent.agent_id,
        name: "Digest".to_string(),
        description: None,
        status: WorkflowStatus::Active,
        prompt: "Compile the digest".to_string(),
    };
    f.catalog.upsert_workflow(&workflow).await.unwrap();

    let result = TriggerResult::workflow("wf-digest", Some(json!({"folder": "inbox"})), ExecutionVariables::new()).unwrap();
    let event = event_for(&agent, TriggerType::Schedule, json!({}));
    let outcome = f.service.execute_trigger_result(agent.agent_id, &result, &event).await;

    assert!(outcome.success, "{outcome:?}");
    let run = f.runs.get(outcome.run_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(run.metadata.target, Some(RunTarget::Workflow));
    assert_eq!(run.metadata.workflow_id.as_deref(), Some("wf-digest"));

    let messages = f.threads.list_messages(outcome.thread_id.unwrap()).await.unwrap();
    assert!(messages[0].1.starts_with("Compile the digest"));
    assert!(messages[0].1.contains("<workflow_input>"));
}

#[tokio::test]
async fn test_webhook_workflow_result_runs_agent() {
    let f = fixture().await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;

    // No workflow exists: the workflow path would fail, the agent path must not.
    let result = TriggerResult::workflow("wf-missing", None, ExecutionVariables::new()).unwrap();
    let event = event_for(&agent, TriggerType::Webhook, json!({"ping": true}));
    let outcome = f.service.execute_trigger_result(agent.agent_id, &result, &event).await;

    assert!(outcome.success, "{outcome:?}");
    let run = f.runs.get(outcome.run_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(run.metadata.target, Some(RunTarget::Agent));
    assert!(run.metadata.workflow_id.is_none());
}

#[tokio::test]
async fn test_inactive_workflow_fails_before_provisioning() {
    let f = fixture().await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let workflow = Workflow {
        workflow_id: "wf-paused".to_string(),
        agent_id: agent.agent_id,
        name: "Paused".to_string(),
        description: None,
        status: WorkflowStatus::Paused,
        prompt: "Never runs".to_string(),
    };
    f.catalog.upsert_workflow(&workflow).await.unwrap();

    let result = TriggerResult::workflow("wf-paused", None, ExecutionVariables::new()).unwrap();
    let event = event_for(&agent, TriggerType::Schedule, json!({}));
    let outcome = f.service.execute_trigger_result(agent.agent_id, &result, &event).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("wf-paused"));
    assert_eq!(count_rows(&f.pool, "projects").await, 0);
}

#[tokio::test]
async fn test_unknown_agent_fails() {
    let f = fixture().await;
    let ghost = AgentConfig {
        agent_id: Uuid::new_v4(),
        account_id: Uuid::new_v4(),
        name: "ghost".to_string(),
        system_prompt: String::new(),
        model: None,
        config: json!({}),
    };
    let event = event_for(&ghost, TriggerType::Schedule, json!({}));
    let outcome = f
        .service
        .execute_trigger_result(ghost.agent_id, &TriggerResult::agent("Go", ExecutionVariables::new()), &event)
        .await;

    assert!(!outcome.success);
    assert_eq!(count_rows(&f.pool, "projects").await, 0);
}

#[tokio::test]
async fn test_enqueue_failure_cleans_up() {
    let f = fixture_with(Arc::new(AllowAllBillingGate), Some(Arc::new(FailingRunner))).await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let event = event_for(&agent, TriggerType::Schedule, json!({}));

    let outcome = f
        .service
        .execute_trigger_result(agent.agent_id, &TriggerResult::agent("Go", ExecutionVariables::new()), &event)
        .await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("runner queue unavailable"));
    assert_eq!(count_rows(&f.pool, "projects").await, 0);
    assert_eq!(count_rows(&f.pool, "threads").await, 0);
    assert_eq!(count_rows(&f.pool, "agent_runs").await, 0);
    assert_eq!(f.sandboxes.live_sandboxes().await, 0);
    assert!(f.store.keys_matching("active_run:*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_result_starts_nothing() {
    let f = fixture().await;
    let agent = seed_agent(&f.catalog, Uuid::new_v4()).await;
    let event = event_for(&agent, TriggerType::Webhook, json!({"n": 1}));

    let outcome = f
        .service
        .execute_trigger_result(agent.agent_id, &TriggerResult::failed("Trigger is not active"), &event)
        .await;

    assert!(!outcome.success);
    assert!(outcome.run_id.is_none());
    assert!(outcome.error.unwrap().contains("Trigger is not active"));
    assert_eq!(count_rows(&f.pool, "projects").await, 0);
    assert_eq!(f.sandboxes.live_sandboxes().await, 0);
    assert!(f.store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap().is_empty());
}
