//! Headless single-task execution
//!
//! Used by OS-level schedulers: load the store, run exactly one task through
//! the same path as a manual run, and report through the exit code.

use anyhow::Result;
use std::process::ExitCode;
use tracing::{error, info};
use uuid::Uuid;

use crate::server::config::AppConfig;
use crate::server::init_components;

pub async fn run(config: AppConfig, task_id: Uuid) -> Result<ExitCode> {
    let components = init_components(config).await?;
    let manager = components.manager;

    info!(task_id = %task_id, "Headless execution requested");

    let succeeded = match manager.run_now(task_id).await {
        Ok(succeeded) => succeeded,
        Err(e) => {
            error!(task_id = %task_id, error = %e, "Headless execution failed");
            return Ok(ExitCode::FAILURE);
        }
    };

    let result = manager
        .get_task(task_id)
        .await
        .ok()
        .and_then(|t| t.last_run_result)
        .unwrap_or_default();
    manager.shutdown().await;

    if succeeded {
        info!(task_id = %task_id, result = %result, "Headless execution succeeded");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(task_id = %task_id, result = %result, "Headless execution did not succeed");
        Ok(ExitCode::FAILURE)
    }
}
