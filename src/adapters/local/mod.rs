//! Local stand-ins for collaborators that live outside this service.

/// Billing gate.
pub mod billing;
pub mod runner_queue;
pub mod sandbox;

pub use billing::AllowAllBillingGate;
pub use runner_queue::{QueueBackgroundRunner, RUNNER_QUEUE_KEY};
pub use sandbox::LocalSandboxManager;
