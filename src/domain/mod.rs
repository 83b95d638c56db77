//! Domain layer for the runwire trigger and run-control engine
//!
//! Pure models and the port traits that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
