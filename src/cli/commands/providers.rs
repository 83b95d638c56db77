//! `runwire providers`: the provider catalog.

use anyhow::Result;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Config, ProviderDefinition};
use crate::infrastructure::AppContext;

/// Provider listing.
#[derive(Debug, serde::Serialize)]
pub struct ProviderListOutput {
    /// Registered providers.
    pub providers: Vec<ProviderDefinition>,
}

impl CommandOutput for ProviderListOutput {
    fn to_human(&self) -> String {
        if self.providers.is_empty() {
            return "No trigger providers registered.".to_string();
        }

        let mut lines = vec![format!("{:<12} {:<10} {:<8} {:<40}", "ID", "TYPE", "WEBHOOK", "DESCRIPTION")];
        lines.push("-".repeat(72));
        for provider in &self.providers {
            lines.push(format!(
                "{:<12} {:<10} {:<8} {:<40}",
                provider.provider_id,
                provider.trigger_type.as_str(),
                if provider.webhook_enabled { "yes" } else { "no" },
                truncate(&provider.description, 40),
            ));
        }
        lines.join("\n")
    }
}

/// Run `providers`.
pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;
    let out = ProviderListOutput {
        providers: ctx.triggers.list_provider_definitions().await,
    };
    output(&out, json_mode);
    Ok(())
}
