//! Remote scheduler adapters.

pub mod http_client;
pub mod mock;

pub use http_client::{HttpScheduler, HttpSchedulerConfig};
pub use mock::MockScheduler;
