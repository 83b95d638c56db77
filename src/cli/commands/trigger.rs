//! Trigger CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, short_id, truncate, ActionOutput, CommandOutput};
use crate::domain::models::{Config, Trigger, TriggerType};
use crate::domain::ports::TriggerEventRecord;
use crate::infrastructure::AppContext;

/// Trigger management commands
#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Trigger subcommand.
    #[command(subcommand)]
    pub command: TriggerCommands,
}

/// Trigger subcommands.
#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// List triggers of an agent, or active triggers of one type
    List {
        /// Agent whose triggers to list
        #[arg(long, conflicts_with = "trigger_type")]
        agent: Option<Uuid>,

        /// Only active triggers of this type (schedule, webhook)
        #[arg(long = "type")]
        trigger_type: Option<String>,
    },
    /// Show trigger details
    Show { trigger_id: Uuid },
    /// Activate a trigger (installs its provider side effect)
    Activate { trigger_id: Uuid },
    /// Deactivate a trigger (removes its provider side effect)
    Deactivate { trigger_id: Uuid },
    /// Delete a trigger
    Delete { trigger_id: Uuid },
    /// Show the most recent events of a trigger
    Events {
        trigger_id: Uuid,

        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

/// Trigger as printed by the CLI.
#[derive(Debug, serde::Serialize)]
pub struct TriggerOutput {
    /// Trigger id.
    pub trigger_id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Provider id.
    pub provider_id: String,
    /// Trigger type.
    pub trigger_type: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Activation state.
    pub is_active: bool,
    /// Provider config.
    pub config: serde_json::Value,
    /// Last update, RFC 3339.
    pub updated_at: String,
}

impl From<&Trigger> for TriggerOutput {
    fn from(t: &Trigger) -> Self {
        Self {
            trigger_id: t.trigger_id().to_string(),
            agent_id: t.agent_id().to_string(),
            provider_id: t.provider_id.clone(),
            trigger_type: t.trigger_type.as_str().to_string(),
            name: t.name().to_string(),
            description: t.description().map(str::to_string),
            is_active: t.is_active(),
            config: t.trigger_config().config_value(),
            updated_at: t.metadata.updated_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for TriggerOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Trigger: {}", self.name),
            format!("ID: {}", self.trigger_id),
            format!("Agent: {}", self.agent_id),
            format!("Provider: {} ({})", self.provider_id, self.trigger_type),
            format!("Active: {}", self.is_active),
            format!("Updated: {}", self.updated_at),
        ];
        if let Some(ref description) = self.description {
            lines.push(format!("Description: {description}"));
        }
        lines.push(format!(
            "\nConfig: {}",
            serde_json::to_string_pretty(&self.config).unwrap_or_default()
        ));
        lines.join("\n")
    }
}

/// Trigger listing.
#[derive(Debug, serde::Serialize)]
pub struct TriggerListOutput {
    /// Triggers.
    pub triggers: Vec<TriggerOutput>,
    /// Number of triggers.
    pub total: usize,
}

impl CommandOutput for TriggerListOutput {
    fn to_human(&self) -> String {
        if self.triggers.is_empty() {
            return "No triggers found.".to_string();
        }

        let mut lines = vec![format!("Found {} trigger(s):\n", self.total)];
        lines.push(format!(
            "{:<10} {:<28} {:<10} {:<8} {:<25}",
            "ID", "NAME", "TYPE", "ACTIVE", "UPDATED"
        ));
        lines.push("-".repeat(84));
        for t in &self.triggers {
            lines.push(format!(
                "{:<10} {:<28} {:<10} {:<8} {:<25}",
                &t.trigger_id[..8],
                truncate(&t.name, 26),
                t.trigger_type,
                if t.is_active { "yes" } else { "no" },
                t.updated_at,
            ));
        }
        lines.join("\n")
    }
}

/// Event log of a trigger.
#[derive(Debug, serde::Serialize)]
pub struct TriggerEventsOutput {
    /// Trigger id.
    pub trigger_id: Uuid,
    /// Events, newest first.
    pub events: Vec<TriggerEventRecord>,
}

impl CommandOutput for TriggerEventsOutput {
    fn to_human(&self) -> String {
        if self.events.is_empty() {
            return format!("No events recorded for trigger {}.", self.trigger_id);
        }

        let mut lines = vec![format!("{:<10} {:<25} {:<8} {:<10} {:<30}", "EVENT", "TIME", "OK", "EXECUTED", "ERROR")];
        lines.push("-".repeat(86));
        for event in &self.events {
            let executed = event
                .execution
                .as_ref()
                .and_then(|e| e.get("success"))
                .and_then(serde_json::Value::as_bool)
                .map_or("-", |ok| if ok { "yes" } else { "failed" });
            lines.push(format!(
                "{:<10} {:<25} {:<8} {:<10} {:<30}",
                short_id(&event.event_id),
                event.timestamp.to_rfc3339(),
                if event.success { "yes" } else { "no" },
                executed,
                truncate(event.error_message.as_deref().unwrap_or(""), 30),
            ));
        }
        lines.join("\n")
    }
}

/// Run a `trigger` subcommand.
pub async fn execute(args: TriggerArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;
    let service = &ctx.triggers;

    match args.command {
        TriggerCommands::List { agent, trigger_type } => {
            let triggers = match (agent, trigger_type) {
                (Some(agent_id), _) => service.list_agent_triggers(agent_id).await?,
                (None, Some(name)) => {
                    let trigger_type = TriggerType::from_str(&name)
                        .with_context(|| format!("unknown trigger type '{name}'"))?;
                    service.list_active_triggers_by_type(trigger_type).await?
                }
                (None, None) => bail!("pass --agent <id> or --type <type>"),
            };
            let out = TriggerListOutput {
                total: triggers.len(),
                triggers: triggers.iter().map(TriggerOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TriggerCommands::Show { trigger_id } => {
            let trigger = service
                .get_trigger(trigger_id)
                .await?
                .with_context(|| format!("trigger {trigger_id} not found"))?;
            output(&TriggerOutput::from(&trigger), json_mode);
        }

        TriggerCommands::Activate { trigger_id } => {
            let trigger = service.activate(trigger_id).await?;
            output(
                &ActionOutput {
                    success: true,
                    message: format!("Trigger '{}' is active.", trigger.name()),
                },
                json_mode,
            );
        }

        TriggerCommands::Deactivate { trigger_id } => {
            let trigger = service.deactivate(trigger_id).await?;
            output(
                &ActionOutput {
                    success: true,
                    message: format!("Trigger '{}' is inactive.", trigger.name()),
                },
                json_mode,
            );
        }

        TriggerCommands::Delete { trigger_id } => {
            service.delete(trigger_id).await?;
            output(
                &ActionOutput {
                    success: true,
                    message: format!("Trigger {trigger_id} deleted."),
                },
                json_mode,
            );
        }

        TriggerCommands::Events { trigger_id, limit } => {
            let out = TriggerEventsOutput {
                trigger_id,
                events: service.list_events(trigger_id, limit).await?,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
