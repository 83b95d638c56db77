//! Sandbox manager that only records handles.
//!
//! Sandbox provisioning is owned by a separate service; this implementation
//! hands out identifiers so runs can be created and cleaned up locally.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::SandboxHandle;
use crate::domain::ports::SandboxManager;

/// Records sandboxes in memory.
#[derive(Default, Clone)]
pub struct LocalSandboxManager {
    live: Arc<RwLock<HashSet<String>>>,
}

impl LocalSandboxManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sandboxes not yet deleted.
    pub async fn live_sandboxes(&self) -> usize {
        self.live.read().await.len()
    }
}

#[async_trait]
impl SandboxManager for LocalSandboxManager {
    async fn create_sandbox(&self, pass: &str, project_id: Uuid) -> DomainResult<SandboxHandle> {
        let sandbox_id = format!("sbx-{}", Uuid::new_v4().simple());
        self.live.write().await.insert(sandbox_id.clone());
        tracing::info!(%sandbox_id, %project_id, "sandbox created");

        Ok(SandboxHandle {
            sandbox_id,
            pass: pass.to_string(),
            vnc_preview: None,
            sandbox_url: None,
        })
    }

    async fn delete_sandbox(&self, sandbox_id: &str) -> DomainResult<()> {
        if self.live.write().await.remove(sandbox_id) {
            tracing::info!(sandbox_id, "sandbox deleted");
        }
        Ok(())
    }
}
