//! Service layer: trigger lifecycle, execution and run control.

pub mod dispatcher;
pub mod execution_service;
pub mod provider_registry;
pub mod providers;
pub mod run_control;
pub mod run_stream;
pub mod trigger_service;

pub use dispatcher::{DispatchOutcome, TriggerDispatcher};
pub use execution_service::{ExecutionDeps, ExecutionOutcome, ExecutionService, ExecutionSettings};
pub use provider_registry::{ProviderContext, ProviderRegistry};
pub use providers::{ScheduleTriggerProvider, WebhookTriggerProvider};
pub use run_control::{ControlSignal, RunControl, RunControlSettings, StopReport};
pub use run_stream::{FanIn, ResponseCursor, RunStreamer, Wake};
pub use trigger_service::{CreateTrigger, ProcessedEvent, TriggerService, TriggerUpdate};
