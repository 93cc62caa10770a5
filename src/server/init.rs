//! Component wiring and the serve loop
//!
//! One rate limiter is created per process and shared by the client behind
//! every batch run, whether triggered by the poll loop or a manual run.

use super::config::AppConfig;
use anyhow::{Context, Result};
use pacer_batch::{job_executor, BatchRunner};
use pacer_client::{RateLimiter, ResilientApiClient};
use pacer_core::credentials::{CredentialProvider, EnvCredentialProvider};
use pacer_core::{ScheduleManager, SchedulerStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Loaded configuration and the wired schedule manager
pub struct Components {
    pub config: AppConfig,
    pub manager: ScheduleManager,
}

/// Build the batch runner over an HTTPS client sharing `limiter`
pub fn build_runner(config: &AppConfig, limiter: Arc<RateLimiter>) -> Result<BatchRunner> {
    let client = ResilientApiClient::from_config(&config.client_config(), limiter)
        .context("Failed to create record service client")?;
    Ok(BatchRunner::new(Arc::new(client)))
}

/// Wire the limiter, client, runner and schedule manager
pub async fn init_components(config: AppConfig) -> Result<Components> {
    let data_dir = config.data_dir();
    info!("Data directory: {}", data_dir.display());

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let runner = Arc::new(build_runner(&config, limiter)?);
    let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvCredentialProvider::new(
        config.credentials.env_prefix.clone(),
    ));

    let store = SchedulerStore::from_path(&config.store_path())
        .context("Failed to open task store")?;
    let manager = ScheduleManager::builder()
        .store(store)
        .credentials(credentials)
        .executor(job_executor(runner))
        .config((&config.scheduler).into())
        .build()
        .await
        .context("Failed to load scheduled tasks")?;

    Ok(Components { config, manager })
}

/// Run the poll loop until Ctrl+C or SIGTERM
pub async fn run(config: AppConfig) -> Result<()> {
    let components = init_components(config).await?;
    let manager = components.manager.clone();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    info!(
        tasks = manager.tasks().await.len(),
        interval_secs = components.config.scheduler.check_interval_secs,
        "Pacer scheduler started"
    );

    manager
        .run(shutdown)
        .await
        .context("Schedule manager failed")?;

    info!("Pacer shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
