//! Ad-hoc batch run of a record file

use anyhow::{Context, Result};
use clap::Args;
use pacer_batch::{BatchJob, BatchProgress, RecordShape};
use pacer_core::credentials::{resolve_pair, CredentialRef, EnvCredentialProvider};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use crate::server::build_runner;
use crate::server::config::AppConfig;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Record source file
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
    /// Suppress per-record progress
    #[arg(long, short)]
    pub quiet: bool,
}

pub async fn run(config: AppConfig, args: BatchArgs) -> Result<ExitCode> {
    let provider = EnvCredentialProvider::new(config.credentials.env_prefix.clone());
    let credentials = resolve_pair(&provider, &CredentialRef::new(args.key_ref, args.secret_ref))
        .context("Credentials unavailable")?;

    let limiter = Arc::new(pacer_client::RateLimiter::new(config.rate_limit.clone()));
    let mut runner = build_runner(&config, limiter)?;
    if !args.quiet {
        runner = runner.with_progress(Arc::new(|p: BatchProgress| {
            println!(
                "[{}/{}] {} ok, {} failed",
                p.processed, p.total, p.succeeded, p.failed
            );
        }));
    }

    let shape = if args.secondary_key {
        RecordShape::with_secondary(args.default_secondary)
    } else {
        RecordShape::primary_only()
    };
    let job = BatchJob::new(args.source, credentials).with_shape(shape);

    let outcome = runner.run(&job).await.context("Batch failed")?;
    info!(output = %outcome.output_path.display(), "Batch results written");
    println!("{}", outcome.summary());

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
