//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use runwire::adapters::control::MemoryControlStore;
use runwire::adapters::scheduler::MockScheduler;
use runwire::adapters::sqlite::{create_migrated_test_pool, SqliteCatalogRepository};
use runwire::domain::models::{AgentConfig, Config, Workflow, WorkflowStatus};
use runwire::infrastructure::AppContext;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

pub const INSTANCE_ID: &str = "inst0001";
pub const BASE_URL: &str = "https://hooks.example.com";

pub struct Harness {
    pub ctx: AppContext,
    pub pool: SqlitePool,
    pub store: Arc<MemoryControlStore>,
    pub scheduler: Arc<MockScheduler>,
    pub catalog: SqliteCatalogRepository,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.public_base_url = BASE_URL.to_string();
    config.execution.instance_id = Some(INSTANCE_ID.to_string());
    config.control.status_poll_interval_ms = 50;
    config.control.unwind_delay_ms = 0;
    config
}

pub async fn harness() -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");
    let store = Arc::new(MemoryControlStore::new());
    let scheduler = Arc::new(MockScheduler::new());
    let ctx = AppContext::assemble(test_config(), pool.clone(), store.clone(), Some(scheduler.clone())).await;

    Harness {
        ctx,
        catalog: SqliteCatalogRepository::new(pool.clone()),
        pool,
        store,
        scheduler,
    }
}

impl Harness {
    pub async fn seed_agent(&self, account_id: Uuid) -> AgentConfig {
        seed_agent(&self.catalog, account_id).await
    }

    pub async fn seed_workflow(&self, agent_id: Uuid, status: WorkflowStatus) -> Workflow {
        let workflow = Workflow {
            workflow_id: format!("wf-{}", Uuid::new_v4().simple()),
            agent_id,
            name: "Daily digest".to_string(),
            description: None,
            status,
            prompt: "Compile the daily digest".to_string(),
        };
        self.catalog.upsert_workflow(&workflow).await.expect("seed workflow");
        workflow
    }

    pub async fn count(&self, table: &str) -> i64 {
        count_rows(&self.pool, table).await
    }
}

pub async fn seed_agent(catalog: &SqliteCatalogRepository, account_id: Uuid) -> AgentConfig {
    let agent = AgentConfig {
        agent_id: Uuid::new_v4(),
        account_id,
        name: "Inbox triage".to_string(),
        system_prompt: "You triage inboxes.".to_string(),
        model: None,
        config: json!({"credential_profiles": ["gmail"]}),
    };
    catalog.upsert_agent(&agent).await.expect("seed agent");
    agent
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

pub fn schedule_config(prompt: &str) -> serde_json::Value {
    json!({
        "cron_expression": "0 9 * * *",
        "execution_type": "agent",
        "agent_prompt": prompt,
        "timezone": "America/New_York",
    })
}
