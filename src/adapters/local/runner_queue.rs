//! Background runner hand-off through the control store.
//!
//! Jobs are serialized onto a shared list that worker processes drain.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::RunJob;
use crate::domain::ports::{BackgroundRunner, ControlStore};

/// List key worker processes consume from.
pub const RUNNER_QUEUE_KEY: &str = "runner:jobs";

/// Queues run jobs on a control store list.
pub struct QueueBackgroundRunner {
    store: Arc<dyn ControlStore>,
}

impl QueueBackgroundRunner {
    /// Runner over `store`.
    pub fn new(store: Arc<dyn ControlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BackgroundRunner for QueueBackgroundRunner {
    async fn enqueue(&self, job: RunJob) -> DomainResult<()> {
        let payload = serde_json::to_string(&job)?;
        let depth = self.store.push(RUNNER_QUEUE_KEY, &payload).await?;
        tracing::debug!(run_id = %job.run_id, depth, "run job queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::control::MemoryControlStore;
    use crate::domain::models::ModelParams;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_enqueue_appends_serialized_job() {
        let store = Arc::new(MemoryControlStore::new());
        let runner = QueueBackgroundRunner::new(store.clone());
        let job = RunJob {
            run_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            instance_id: "a1b2c3d4".to_string(),
            project_id: Uuid::new_v4(),
            model: ModelParams {
                model_name: "anthropic/claude-sonnet-4".to_string(),
                enable_thinking: false,
                reasoning_effort: "low".to_string(),
                stream: true,
                enable_context_manager: true,
            },
            agent_config: json!({}),
            trigger_variables: json!({"user": "Ada"}),
        };

        runner.enqueue(job.clone()).await.unwrap();

        let queued = store.range(RUNNER_QUEUE_KEY, 0, -1).await.unwrap();
        assert_eq!(queued.len(), 1);
        let decoded: RunJob = serde_json::from_str(&queued[0]).unwrap();
        assert_eq!(decoded, job);
    }
}
