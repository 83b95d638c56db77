//! In-memory scheduler for tests and local runs without a remote scheduler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{RemoteSchedule, RemoteScheduler, ScheduleRequest};

/// In-memory scheduler for tests and local runs.
#[derive(Default)]
pub struct MockScheduler {
    schedules: Arc<RwLock<BTreeMap<String, (RemoteSchedule, ScheduleRequest)>>>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    fail_creates: AtomicBool,
}

impl MockScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_schedule` fail.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Number of create calls.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of delete calls.
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Registered requests, in handle order.
    pub async fn requests(&self) -> Vec<ScheduleRequest> {
        self.schedules.read().await.values().map(|(_, req)| req.clone()).collect()
    }

    /// Drop a schedule without going through the API, as if it expired remotely.
    pub async fn forget(&self, schedule_id: &str) {
        self.schedules.write().await.remove(schedule_id);
    }
}

#[async_trait]
impl RemoteScheduler for MockScheduler {
    async fn create_schedule(&self, request: &ScheduleRequest) -> DomainResult<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DomainError::ExternalService("mock scheduler unavailable".to_string()));
        }

        let schedule_id = format!("scd_{}", Uuid::new_v4().simple());
        let schedule = RemoteSchedule {
            schedule_id: schedule_id.clone(),
            destination: request.destination.clone(),
            cron: request.cron.clone(),
            is_paused: false,
        };
        self.schedules
            .write()
            .await
            .insert(schedule_id.clone(), (schedule, request.clone()));
        Ok(schedule_id)
    }

    async fn delete_schedule(&self, schedule_id: &str) -> DomainResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.schedules.write().await.remove(schedule_id);
        Ok(())
    }

    async fn get_schedule(&self, schedule_id: &str) -> DomainResult<Option<RemoteSchedule>> {
        Ok(self.schedules.read().await.get(schedule_id).map(|(s, _)| s.clone()))
    }

    async fn list_schedules(&self) -> DomainResult<Vec<RemoteSchedule>> {
        Ok(self.schedules.read().await.values().map(|(s, _)| s.clone()).collect())
    }
}
