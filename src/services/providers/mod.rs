//! Built-in trigger providers.

pub mod cron_tz;
pub mod schedule;
pub mod template;
pub mod webhook;

pub use schedule::{ExecutionType, ScheduleConfig, ScheduleTriggerProvider};
pub use webhook::{WebhookConfig, WebhookTriggerProvider};

use uuid::Uuid;

/// Stable per-trigger callback URL: `{base}/api/triggers/{id}/webhook`.
pub fn webhook_url(base_url: &str, trigger_id: Uuid) -> String {
    format!("{}/api/triggers/{}/webhook", base_url.trim_end_matches('/'), trigger_id)
}
