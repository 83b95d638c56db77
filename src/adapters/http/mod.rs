//! HTTP surface: trigger management, inbound webhooks, run streaming and
//! stop.

pub mod caller;
pub mod error;
pub mod runs;
pub mod server;
pub mod triggers;

pub use caller::Caller;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use server::{AppState, HttpServer, HttpServerConfig};
