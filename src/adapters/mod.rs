//! Adapters for external systems.

pub mod control;
pub mod http;
pub mod local;
pub mod scheduler;
pub mod sqlite;
