//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Project setup and startup wiring

pub mod config;
pub mod logging;
pub mod setup;

pub use setup::{AppContext, SetupPaths};
