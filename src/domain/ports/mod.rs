//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - TriggerRepository / TriggerEventLogRepository: trigger persistence
//! - TriggerProvider: one trigger type's validation, setup and event mapping
//! - RemoteScheduler: the external cron service
//! - RunRepository: durable run records
//! - ControlStore: shared list + pub/sub store of the run control plane
//! - AgentCatalog / WorkflowCatalog / ThreadStore and the remaining
//!   execution collaborators

pub mod catalog;
pub mod collaborators;
pub mod control_store;
pub mod remote_scheduler;
pub mod run_repository;
pub mod thread_store;
pub mod trigger_provider;
pub mod trigger_repository;

pub use catalog::{AgentCatalog, WorkflowCatalog};
pub use collaborators::{BackgroundRunner, BillingGate, ProfileStore, SandboxManager};
pub use control_store::{ControlStore, ControlSubscription};
pub use remote_scheduler::{RemoteSchedule, RemoteScheduler, ScheduleRequest};
pub use run_repository::RunRepository;
pub use thread_store::ThreadStore;
pub use trigger_provider::TriggerProvider;
pub use trigger_repository::{TriggerEventLogRepository, TriggerEventRecord, TriggerRepository};
