//! Runwire - trigger-driven agent execution with a distributed run control
//! plane.
//!
//! External events (cron ticks delivered by a remote scheduler, inbound
//! webhooks) start agent or workflow runs; any process can stream a run's
//! output or stop it through a shared list + pub/sub store.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Adapters** (`adapters`): SQLite, control stores, remote scheduler,
//!   local collaborators and the HTTP surface
//! - **Service Layer** (`services`): providers, trigger lifecycle, execution,
//!   run control and streaming
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and
//!   startup wiring
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, ExecutionRun, RunStatus, Trigger, TriggerEvent, TriggerResult, TriggerType,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::AppContext;
pub use services::{
    ExecutionService, ProviderRegistry, RunControl, RunStreamer, TriggerDispatcher, TriggerService,
};
