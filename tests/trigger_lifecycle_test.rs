mod common;

use common::{harness, schedule_config, BASE_URL, INSTANCE_ID};
use runwire::adapters::local::RUNNER_QUEUE_KEY;
use runwire::domain::errors::DomainError;
use runwire::domain::models::{RunJob, RunStatus, RunTarget, TriggerType};
use runwire::domain::ports::ControlStore;
use runwire::services::providers::schedule::SCHEDULE_ID_KEY;
use runwire::services::run_control::keys;
use runwire::services::{CreateTrigger, TriggerUpdate};
use serde_json::json;
use uuid::Uuid;

fn create_schedule(agent_id: Uuid, prompt: &str) -> CreateTrigger {
    CreateTrigger {
        agent_id,
        provider_id: "schedule".to_string(),
        name: "Morning briefing".to_string(),
        description: Some("Runs every morning".to_string()),
        config: schedule_config(prompt),
    }
}

#[tokio::test]
async fn test_create_schedule_trigger_registers_remote_schedule() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;

    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Summarize my inbox"))
        .await
        .unwrap();

    assert!(trigger.is_active());
    assert_eq!(trigger.trigger_type, TriggerType::Schedule);
    let schedule_id = trigger.config_str(SCHEDULE_ID_KEY).expect("schedule id stored");
    assert!(schedule_id.starts_with("scd_"));

    assert_eq!(h.scheduler.create_calls(), 1);
    let requests = h.scheduler.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].destination,
        format!("{BASE_URL}/api/triggers/{}/webhook", trigger.trigger_id())
    );
    assert_eq!(requests[0].body["trigger_id"], json!(trigger.trigger_id()));
    assert_eq!(requests[0].body["agent_prompt"], json!("Summarize my inbox"));

    let stored = h.ctx.triggers.get_trigger(trigger.trigger_id()).await.unwrap().unwrap();
    assert_eq!(stored.config_str(SCHEDULE_ID_KEY), Some(schedule_id));
    assert!(h.ctx.triggers.health_check_trigger(trigger.trigger_id()).await.unwrap());
}

#[tokio::test]
async fn test_failed_setup_persists_nothing() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    h.scheduler.fail_creates(true);

    let err = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Summarize my inbox"))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ProviderSetup(_)), "got {err:?}");
    assert_eq!(h.count("triggers").await, 0);
    assert!(h.ctx.triggers.list_agent_triggers(agent.agent_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_config_never_reaches_scheduler() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;

    let err = h
        .ctx
        .triggers
        .create(CreateTrigger {
            config: json!({
                "cron_expression": "0 9 * * *",
                "execution_type": "agent",
                "agent_prompt": "hi",
                "workflow_id": "wf-1",
            }),
            ..create_schedule(agent.agent_id, "unused")
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Configuration(_)), "got {err:?}");
    assert_eq!(h.scheduler.create_calls(), 0);
    assert_eq!(h.count("triggers").await, 0);
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;

    let err = h
        .ctx
        .triggers
        .create(CreateTrigger {
            provider_id: "telegram".to_string(),
            ..create_schedule(agent.agent_id, "hi")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ProviderNotFound(ref id) if id == "telegram"));
}

#[tokio::test]
async fn test_deactivate_and_activate_manage_remote_schedule() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Summarize"))
        .await
        .unwrap();
    let id = trigger.trigger_id();

    let inactive = h.ctx.triggers.deactivate(id).await.unwrap();
    assert!(!inactive.is_active());
    assert!(inactive.config_str(SCHEDULE_ID_KEY).is_none());
    assert_eq!(h.scheduler.delete_calls(), 1);
    assert!(h.scheduler.requests().await.is_empty());
    assert!(!h.ctx.triggers.health_check_trigger(id).await.unwrap());

    // Already inactive: no second teardown.
    h.ctx.triggers.deactivate(id).await.unwrap();
    assert_eq!(h.scheduler.delete_calls(), 1);

    let active = h.ctx.triggers.activate(id).await.unwrap();
    assert!(active.is_active());
    assert!(active.config_str(SCHEDULE_ID_KEY).is_some());
    assert_eq!(h.scheduler.create_calls(), 2);
    assert_eq!(h.scheduler.requests().await.len(), 1);

    // Already active: no second setup.
    h.ctx.triggers.activate(id).await.unwrap();
    assert_eq!(h.scheduler.create_calls(), 2);

    let listed = h
        .ctx
        .triggers
        .list_active_triggers_by_type(TriggerType::Schedule)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].trigger_id(), id);
}

#[tokio::test]
async fn test_update_replaces_schedule() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Old prompt"))
        .await
        .unwrap();
    let old_schedule = trigger.config_str(SCHEDULE_ID_KEY).unwrap().to_string();

    let updated = h
        .ctx
        .triggers
        .update(
            trigger.trigger_id(),
            TriggerUpdate {
                name: Some("Evening briefing".to_string()),
                config: Some(schedule_config("New prompt")),
                ..TriggerUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name(), "Evening briefing");
    assert!(updated.is_active());
    let new_schedule = updated.config_str(SCHEDULE_ID_KEY).unwrap();
    assert_ne!(new_schedule, old_schedule);

    let requests = h.scheduler.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body["agent_prompt"], json!("New prompt"));
}

#[tokio::test]
async fn test_update_to_inactive_leaves_no_schedule() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Prompt"))
        .await
        .unwrap();

    let updated = h
        .ctx
        .triggers
        .update(
            trigger.trigger_id(),
            TriggerUpdate {
                is_active: Some(false),
                ..TriggerUpdate::default()
            },
        )
        .await
        .unwrap();

    assert!(!updated.is_active());
    assert!(updated.config_str(SCHEDULE_ID_KEY).is_none());
    assert!(h.scheduler.requests().await.is_empty());
}

#[tokio::test]
async fn test_delete_tears_down_and_removes() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Prompt"))
        .await
        .unwrap();

    h.ctx.triggers.delete(trigger.trigger_id()).await.unwrap();

    assert!(h.scheduler.requests().await.is_empty());
    assert!(h.ctx.triggers.get_trigger(trigger.trigger_id()).await.unwrap().is_none());
    let err = h.ctx.triggers.delete(trigger.trigger_id()).await.unwrap_err();
    assert!(matches!(err, DomainError::TriggerNotFound(_)));
}

#[tokio::test]
async fn test_health_check_notices_lost_schedule() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Prompt"))
        .await
        .unwrap();

    h.scheduler.forget(trigger.config_str(SCHEDULE_ID_KEY).unwrap()).await;
    assert!(!h.ctx.triggers.health_check_trigger(trigger.trigger_id()).await.unwrap());
}

#[tokio::test]
async fn test_schedule_callback_starts_agent_run() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Summarize my inbox"))
        .await
        .unwrap();

    // The scheduler posts back exactly the payload it was registered with.
    let payload = h.scheduler.requests().await[0].body.clone();
    let outcome = h.ctx.dispatcher.dispatch(trigger.trigger_id(), payload).await;

    assert!(outcome.success(), "{outcome:?}");
    assert!(outcome.result.should_execute_agent());
    assert_eq!(outcome.result.agent_prompt(), Some("Summarize my inbox"));
    let execution = outcome.execution.expect("execution started");
    let run_id = execution.run_id.expect("run id");

    let run = h.ctx.runs.get(run_id).await.unwrap().expect("run persisted");
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.agent_id, Some(agent.agent_id));
    assert_eq!(run.metadata.target, Some(RunTarget::Agent));
    assert_eq!(run.metadata.trigger_id, Some(trigger.trigger_id()));
    assert_eq!(run.metadata.trigger_event_id, outcome.event_id);

    let marker = keys::active_run_marker(INSTANCE_ID, run_id);
    assert_eq!(h.store.keys_matching(&marker).await.unwrap(), vec![marker]);

    let jobs = h.store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job: RunJob = serde_json::from_str(&jobs[0]).unwrap();
    assert_eq!(job.run_id, run_id);
    assert_eq!(job.instance_id, INSTANCE_ID);

    let events = h.ctx.triggers.list_events(trigger.trigger_id(), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    let recorded = events[0].execution.as_ref().expect("execution recorded");
    assert_eq!(recorded["run_id"], json!(run_id));
}

#[tokio::test]
async fn test_webhook_event_maps_payload_into_prompt() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(CreateTrigger {
            agent_id: agent.agent_id,
            provider_id: "webhook".to_string(),
            name: "Order hook".to_string(),
            description: None,
            config: json!({
                "field_mappings": {"customer": "order.customer.name", "total": "order.total"},
                "template": {"agent_prompt": "New order from {customer} worth {total}"},
            }),
        })
        .await
        .unwrap();
    assert_eq!(h.scheduler.create_calls(), 0);
    assert!(h.ctx.triggers.health_check_trigger(trigger.trigger_id()).await.unwrap());

    let outcome = h
        .ctx
        .dispatcher
        .dispatch(
            trigger.trigger_id(),
            json!({"order": {"customer": {"name": "Ada"}, "total": 42}}),
        )
        .await;

    assert!(outcome.success(), "{outcome:?}");
    assert_eq!(outcome.result.agent_prompt(), Some("New order from Ada worth 42"));
    assert_eq!(outcome.result.execution_variables().get("customer"), Some(&json!("Ada")));

    let run_id = outcome.execution.and_then(|e| e.run_id).expect("run id");
    let run = h.ctx.runs.get(run_id).await.unwrap().unwrap();
    assert_eq!(run.metadata.trigger_variables["total"], json!(42));
}

#[tokio::test]
async fn test_event_for_inactive_trigger_is_rejected() {
    let h = harness().await;
    let agent = h.seed_agent(Uuid::new_v4()).await;
    let trigger = h
        .ctx
        .triggers
        .create(create_schedule(agent.agent_id, "Prompt"))
        .await
        .unwrap();
    h.ctx.triggers.deactivate(trigger.trigger_id()).await.unwrap();

    let outcome = h.ctx.dispatcher.dispatch(trigger.trigger_id(), json!({})).await;

    assert!(!outcome.success());
    assert!(outcome.event_id.is_none());
    assert!(outcome.execution.is_none());
    assert!(h.ctx.triggers.list_events(trigger.trigger_id(), 10).await.unwrap().is_empty());
    assert_eq!(h.count("agent_runs").await, 0);
}

#[tokio::test]
async fn test_event_for_unknown_trigger_is_rejected() {
    let h = harness().await;
    let outcome = h.ctx.dispatcher.dispatch(Uuid::new_v4(), json!({})).await;
    assert!(!outcome.success());
    assert!(outcome.result.error_message().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_provider_definitions_list_builtins() {
    let h = harness().await;
    let mut ids: Vec<String> = h
        .ctx
        .triggers
        .list_provider_definitions()
        .await
        .into_iter()
        .map(|d| d.provider_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["schedule".to_string(), "webhook".to_string()]);
}
