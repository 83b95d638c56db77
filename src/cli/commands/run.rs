//! Run CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ExecutionRun, StopCause};
use crate::infrastructure::AppContext;
use crate::services::StopReport;

/// Run inspection and control commands
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run subcommand.
    #[command(subcommand)]
    pub command: RunCommands,
}

/// Run subcommands.
#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Show the durable status of a run
    Status { run_id: Uuid },
    /// Stop a run on every instance
    Stop { run_id: Uuid },
}

/// Run status.
#[derive(Debug, serde::Serialize)]
pub struct RunStatusOutput {
    /// Run record.
    #[serde(flatten)]
    pub run: ExecutionRun,
}

impl CommandOutput for RunStatusOutput {
    fn to_human(&self) -> String {
        let run = &self.run;
        let mut lines = vec![
            format!("Run: {}", run.run_id),
            format!("Thread: {}", run.thread_id),
            format!("Status: {}", run.status),
            format!("Started: {}", run.started_at.to_rfc3339()),
        ];
        if let Some(completed) = run.completed_at {
            lines.push(format!("Completed: {}", completed.to_rfc3339()));
        }
        if let Some(ref error) = run.error {
            lines.push(format!("Error: {error}"));
        }
        if let Some(trigger_id) = run.metadata.trigger_id {
            lines.push(format!("Trigger: {trigger_id}"));
        }
        lines.join("\n")
    }
}

/// Result of `run stop`.
#[derive(Debug, serde::Serialize)]
pub struct StopOutput {
    /// Stop summary.
    #[serde(flatten)]
    pub report: StopReport,
}

impl CommandOutput for StopOutput {
    fn to_human(&self) -> String {
        format!(
            "Run {} is {} (STOP sent to {} channel(s), {} instance(s)).",
            self.report.run_id,
            self.report.status,
            self.report.publishes,
            self.report.instances.len()
        )
    }
}

/// Run a `run` subcommand.
pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;

    match args.command {
        RunCommands::Status { run_id } => {
            let run = ctx
                .runs
                .get(run_id)
                .await?
                .with_context(|| format!("run {run_id} not found"))?;
            output(&RunStatusOutput { run }, json_mode);
        }
        RunCommands::Stop { run_id } => {
            let report = ctx.control.stop_run(run_id, StopCause::UserRequested).await?;
            output(&StopOutput { report }, json_mode);
        }
    }

    Ok(())
}
