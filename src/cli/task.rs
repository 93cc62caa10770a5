//! Task management commands

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use clap::{Args, Subcommand};
use pacer_core::credentials::CredentialRef;
use pacer_core::{Frequency, JobParams, Recurrence, ScheduleManager, ScheduledTask};
use std::path::PathBuf;
use uuid::Uuid;

use crate::server::config::AppConfig;
use crate::server::init_components;

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List stored tasks
    List,
    /// Show one task as JSON
    Show { task_id: Uuid },
    /// Add a task
    Add(AddArgs),
    /// Remove a task
    Remove { task_id: Uuid },
    /// Enable a task and schedule its next run
    Enable { task_id: Uuid },
    /// Disable a task
    Disable { task_id: Uuid },
    /// Merge tasks from an exported document
    Import { path: PathBuf },
    /// Export all tasks to a document
    Export { path: PathBuf },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Record source file
    #[arg(long)]
    pub source: PathBuf,
    /// Reference name of the account key
    #[arg(long)]
    pub key_ref: String,
    /// Reference name of the account secret
    #[arg(long)]
    pub secret_ref: String,
    /// Records carry a `secondary,primary` key pair
    #[arg(long)]
    pub secondary_key: bool,
    /// Secondary key for records that omit it
    #[arg(long, requires = "secondary_key")]
    pub default_secondary: Option<String>,
    /// Create the task disabled
    #[arg(long)]
    pub disabled: bool,
    #[command(flatten)]
    pub schedule: ScheduleArgs,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// once, daily, weekly, monthly, hourly, every_minutes, bi_weekly,
    /// quarterly, multiple_daily or workdays
    #[arg(long, default_value = "daily")]
    pub frequency: Frequency,
    /// Time of day, HH:MM
    #[arg(long, value_parser = parse_time, default_value = "08:00")]
    pub time: NaiveTime,
    /// First day the task may run (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
    /// Step for daily, hourly and every_minutes
    #[arg(long, default_value_t = 1)]
    pub interval: u32,
    /// Weekdays, e.g. mon,wed,fri
    #[arg(long, value_delimiter = ',', value_parser = parse_weekday)]
    pub days: Vec<Weekday>,
    /// Days of the month, e.g. 1,15
    #[arg(long, value_delimiter = ',')]
    pub month_days: Vec<u32>,
    /// Months (1-12); empty means every month
    #[arg(long, value_delimiter = ',')]
    pub months: Vec<u32>,
    /// Time points for multiple_daily, e.g. 08:00,12:30
    #[arg(long, value_delimiter = ',', value_parser = parse_time)]
    pub times: Vec<NaiveTime>,
}

impl ScheduleArgs {
    /// Build the recurrence, anchoring on `today` when no start date is given
    pub fn to_recurrence(&self, today: NaiveDate) -> Recurrence {
        let start_date = self.start_date.unwrap_or(today);
        let start = NaiveDateTime::new(start_date, self.time);
        match self.frequency {
            Frequency::Once => Recurrence::once(start),
            Frequency::Daily => Recurrence::daily(start, self.interval),
            Frequency::Weekly => Recurrence::weekly(start, self.days.iter().copied()),
            Frequency::BiWeekly => Recurrence::bi_weekly(start, self.days.iter().copied()),
            Frequency::Workdays => Recurrence::workdays(start),
            Frequency::Monthly => Recurrence::monthly(
                start,
                self.month_days.iter().copied(),
                self.months.iter().copied(),
            ),
            Frequency::Quarterly => Recurrence::quarterly(start, self.month_days.iter().copied()),
            Frequency::Hourly => Recurrence::hourly(start, self.interval),
            Frequency::EveryMinutes => Recurrence::every_minutes(start, self.interval),
            Frequency::MultipleDaily => {
                Recurrence::multiple_daily(start_date, self.times.iter().copied())
            }
        }
    }
}

fn parse_time(value: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{value}', expected HH:MM"))
}

fn parse_weekday(value: &str) -> std::result::Result<Weekday, String> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| format!("invalid weekday '{value}'"))
}

pub async fn run(config: AppConfig, command: TaskCommand) -> Result<()> {
    let manager = init_components(config).await?.manager;

    match command {
        TaskCommand::List => list(&manager).await,
        TaskCommand::Show { task_id } => {
            let task = manager.get_task(task_id).await?;
            let status = manager.status_of(task_id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
            println!("status: {status}");
            Ok(())
        }
        TaskCommand::Add(args) => {
            check_schedule(&args.schedule)?;
            let task = build_task(args, Local::now().date_naive());
            let id = manager.add_task(task).await.context("Failed to add task")?;
            let task = manager.get_task(id).await?;
            println!("✅ Added task {id}");
            println!("   {}", task.recurrence.describe());
            println!("   next run: {}", format_next(&task));
            Ok(())
        }
        TaskCommand::Remove { task_id } => {
            manager.remove_task(task_id).await?;
            println!("✅ Removed task {task_id}");
            Ok(())
        }
        TaskCommand::Enable { task_id } => {
            manager.set_enabled(task_id, true).await?;
            println!("✅ Enabled task {task_id}");
            Ok(())
        }
        TaskCommand::Disable { task_id } => {
            manager.set_enabled(task_id, false).await?;
            println!("✅ Disabled task {task_id}");
            Ok(())
        }
        TaskCommand::Import { path } => {
            let count = manager.import_tasks(&path).await?;
            println!("✅ Imported {count} tasks from {}", path.display());
            Ok(())
        }
        TaskCommand::Export { path } => {
            let count = manager.export_tasks(&path).await?;
            println!("✅ Exported {count} tasks to {}", path.display());
            Ok(())
        }
    }
}

fn build_task(args: AddArgs, today: NaiveDate) -> ScheduledTask {
    let mut job = JobParams::new(args.source, CredentialRef::new(args.key_ref, args.secret_ref));
    if args.secondary_key {
        job = job.with_secondary_key(args.default_secondary);
    }

    let mut task = ScheduledTask::new(args.name, job, args.schedule.to_recurrence(today));
    if let Some(description) = args.description {
        task = task.with_description(description);
    }
    task.enabled = !args.disabled;
    task
}

async fn list(manager: &ScheduleManager) -> Result<()> {
    let tasks = manager.tasks().await;
    if tasks.is_empty() {
        println!("No tasks scheduled");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<36}  {:<20}  {:<14}  {:<9}  {:<16}  LAST RESULT",
        "ID", "NAME", "FREQUENCY", "STATUS", "NEXT RUN"
    );
    for task in tasks {
        let status = task.status(now, manager.is_running(task.id));
        println!(
            "{:<36}  {:<20}  {:<14}  {:<9}  {:<16}  {}",
            task.id,
            truncate(&task.name, 20),
            task.recurrence.frequency,
            status,
            format_next(&task),
            task.last_run_result.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn format_next(task: &ScheduledTask) -> String {
    task.next_run_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

/// Reject schedules missing the arguments their frequency needs
fn check_schedule(args: &ScheduleArgs) -> Result<()> {
    match args.frequency {
        Frequency::Weekly | Frequency::BiWeekly if args.days.is_empty() => {
            bail!("--days is required for {}", args.frequency)
        }
        Frequency::Monthly | Frequency::Quarterly if args.month_days.is_empty() => {
            bail!("--month-days is required for {}", args.frequency)
        }
        Frequency::MultipleDaily if args.times.is_empty() => {
            bail!("--times is required for multiple_daily")
        }
        _ => Ok(()),
    }
}
