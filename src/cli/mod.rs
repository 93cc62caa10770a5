//! CLI module for Pacer
//!
//! Provides commands:
//! - `serve`: Run the schedule poll loop
//! - `exec`: Run one stored task headlessly and exit
//! - `task`: Manage stored tasks
//! - `batch`: Run a record file without a stored task

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use uuid::Uuid;

use crate::server::config::AppConfig;

pub mod batch;
pub mod exec;
pub mod task;

/// Pacer batch scheduler CLI
#[derive(Parser, Debug)]
#[command(name = "pacer")]
#[command(about = "Scheduled batch lookups against a rate-limited remote service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Serve,
    /// Execute one stored task and exit (0 on success, 1 on failure)
    Exec {
        /// Task id
        task_id: Uuid,
    },
    /// Manage stored tasks
    #[command(subcommand)]
    Task(task::TaskCommand),
    /// Run a record file through the record service
    Batch(batch::BatchArgs),
}

impl Cli {
    /// Whether the command runs without a console
    #[must_use]
    pub fn is_headless(&self) -> bool {
        matches!(self.command, Some(Commands::Exec { .. }))
    }
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Serve) => {
            crate::server::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Exec { task_id }) => exec::run(config, task_id).await,
        Some(Commands::Task(command)) => {
            task::run(config, command).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Batch(args)) => batch::run(config, args).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}
