//! Schedule manager
//!
//! Owns the task collection and drives execution:
//! - Periodic due-task polling
//! - One execution per task id at a time
//! - Outcome recording and persistence
//! - Graceful shutdown support

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{EventBus, SchedulerEvent};
use super::store::{self, SchedulerStore};
use super::types::{
    to_local, JobReport, JobRequest, Result, ScheduledTask, SchedulerError, TaskStatus, Trigger,
};
use crate::credentials::{resolve_pair, CredentialProvider};

/// Callback type for executing a task's batch job
pub type JobExecutor = Arc<dyn Fn(JobRequest) -> JobFuture + Send + Sync>;

/// Future type for job execution
pub type JobFuture = Pin<Box<dyn Future<Output = Result<JobReport>> + Send>>;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Poll interval in seconds
    pub check_interval_secs: u64,
    /// How long shutdown waits for in-flight executions, in seconds
    pub drain_timeout_secs: u64,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            drain_timeout_secs: 30,
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set poll interval
    pub fn with_check_interval(mut self, secs: u64) -> Self {
        self.check_interval_secs = secs;
        self
    }

    /// Set shutdown drain timeout
    pub fn with_drain_timeout(mut self, secs: u64) -> Self {
        self.drain_timeout_secs = secs;
        self
    }

    /// Set event channel capacity
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Bookkeeping for an in-flight execution
#[derive(Debug, Clone)]
struct RunningTask {
    started_at: DateTime<Utc>,
    trigger: Trigger,
}

struct Inner {
    tasks: RwLock<Vec<ScheduledTask>>,
    running: Mutex<HashMap<Uuid, RunningTask>>,
    store: SchedulerStore,
    credentials: Arc<dyn CredentialProvider>,
    executor: JobExecutor,
    events: EventBus,
    config: SchedulerConfig,
    stop: Mutex<CancellationToken>,
}

/// Removes the running-task entry when the execution ends, even on panic
struct RunningGuard {
    inner: Arc<Inner>,
    task_id: Uuid,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.task_id);
    }
}

/// Process-wide schedule manager.
///
/// Cheap to clone; clones share the same task collection.
#[derive(Clone)]
pub struct ScheduleManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ScheduleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleManager")
            .field("store", &self.inner.store.path())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ScheduleManager {
    /// Create a builder
    pub fn builder() -> ScheduleManagerBuilder {
        ScheduleManagerBuilder::new()
    }

    /// Load persisted tasks and create the manager
    pub async fn load(
        store: SchedulerStore,
        credentials: Arc<dyn CredentialProvider>,
        executor: JobExecutor,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let mut tasks = store.load().await?;
        let now = to_local(Utc::now());
        let mut rescheduled = 0;
        for task in tasks.iter_mut().filter(|t| t.enabled && t.next_run_at.is_none()) {
            task.schedule(now);
            disable_if_unschedulable(task);
            rescheduled += 1;
        }
        if rescheduled > 0 {
            store.save(&tasks).await?;
        }
        info!(
            count = tasks.len(),
            rescheduled,
            path = %store.path().display(),
            "Loaded scheduled tasks"
        );

        let events = EventBus::new(config.event_capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(tasks),
                running: Mutex::new(HashMap::new()),
                store,
                credentials,
                executor,
                events,
                config,
                stop: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    /// Subscribe to scheduler events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// The event bus observers subscribe to
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Snapshot of all tasks
    pub async fn tasks(&self) -> Vec<ScheduledTask> {
        self.inner.tasks.read().await.clone()
    }

    /// Get task by ID
    pub async fn get_task(&self, task_id: Uuid) -> Result<ScheduledTask> {
        self.inner
            .tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or(SchedulerError::TaskNotFound(task_id))
    }

    /// Current status of a task
    pub async fn status_of(&self, task_id: Uuid) -> Result<TaskStatus> {
        let task = self.get_task(task_id).await?;
        Ok(task.status(Utc::now(), self.is_running(task_id)))
    }

    /// Whether the task is executing right now
    #[must_use]
    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.running().contains_key(&task_id)
    }

    /// Number of in-flight executions
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running().len()
    }

    fn running(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, RunningTask>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a new task, computing its first run time
    pub async fn add_task(&self, mut task: ScheduledTask) -> Result<Uuid> {
        validate_task(&task)?;
        {
            let mut tasks = self.inner.tasks.write().await;
            if tasks.iter().any(|t| t.id == task.id) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "Task id already exists: {}",
                    task.id
                )));
            }
            apply_schedule(&mut task, to_local(Utc::now()))?;
            info!(task_id = %task.id, name = %task.name, next_run_at = ?task.next_run_at, "Task added");
            tasks.push(task.clone());
        }
        self.persist_and_notify().await?;
        Ok(task.id)
    }

    /// Replace a task's definition, keeping its run history
    pub async fn update_task(&self, task: ScheduledTask) -> Result<()> {
        validate_task(&task)?;
        {
            let mut tasks = self.inner.tasks.write().await;
            let existing = tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or(SchedulerError::TaskNotFound(task.id))?;
            let mut updated = existing.clone();
            updated.name = task.name;
            updated.description = task.description;
            updated.job = task.job;
            updated.recurrence = task.recurrence;
            updated.enabled = task.enabled;
            updated.updated_at = Utc::now();
            let now_local = to_local(updated.updated_at);
            apply_schedule(&mut updated, now_local)?;
            debug!(task_id = %updated.id, next_run_at = ?updated.next_run_at, "Task updated");
            *existing = updated;
        }
        self.persist_and_notify().await
    }

    /// Remove a task
    pub async fn remove_task(&self, task_id: Uuid) -> Result<()> {
        {
            let mut tasks = self.inner.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|t| t.id != task_id);
            if tasks.len() == before {
                return Err(SchedulerError::TaskNotFound(task_id));
            }
        }
        info!(task_id = %task_id, "Task removed");
        self.persist_and_notify().await
    }

    /// Enable/disable a task
    pub async fn set_enabled(&self, task_id: Uuid, enabled: bool) -> Result<()> {
        {
            let mut tasks = self.inner.tasks.write().await;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or(SchedulerError::TaskNotFound(task_id))?;
            let mut updated = task.clone();
            updated.enabled = enabled;
            updated.updated_at = Utc::now();
            let now_local = to_local(updated.updated_at);
            apply_schedule(&mut updated, now_local)?;
            *task = updated;
        }
        self.persist_and_notify().await
    }

    /// Run a task immediately and wait for it to finish.
    ///
    /// Returns `Ok(false)` when the task could not start (precondition) or the
    /// job reported failure. Fails with [`SchedulerError::AlreadyRunning`] when
    /// the same task is executing.
    pub async fn run_now(&self, task_id: Uuid) -> Result<bool> {
        let task = self.get_task(task_id).await?;
        let guard = self
            .try_claim(task_id, Trigger::Manual)
            .ok_or(SchedulerError::AlreadyRunning(task_id))?;

        let request = match self.prepare(&task).await {
            Ok(request) => request,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Manual run rejected");
                self.record_rejection(task_id, e.to_string()).await;
                drop(guard);
                return Ok(false);
            }
        };

        let report = self.execute(guard, task, Trigger::Manual, Ok(request)).await;
        Ok(report.success)
    }

    /// Dispatch every due task that is not already executing.
    ///
    /// Executions run on their own tokio tasks; this returns as soon as they
    /// are spawned, with the number dispatched.
    pub async fn check_and_dispatch(&self) -> Result<usize> {
        let now = Utc::now();
        let due: Vec<Uuid> = self
            .inner
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.is_due(now))
            .map(|t| t.id)
            .collect();

        if due.is_empty() {
            debug!("No tasks due for execution");
            return Ok(0);
        }

        let mut executions = Vec::with_capacity(due.len());
        for task_id in due {
            if let Some(handle) = self.dispatch(task_id, now).await {
                executions.push(handle);
            }
        }

        let dispatched = executions.len();
        if dispatched > 0 {
            // Observers hear about this cycle once, after its runs finish
            let events = self.inner.events.clone();
            tokio::spawn(async move {
                for handle in executions {
                    if let Err(e) = handle.await {
                        error!("Task execution panicked: {}", e);
                    }
                }
                events.publish(SchedulerEvent::TasksChanged);
            });
        }

        debug!(dispatched, "Dispatched due tasks");
        Ok(dispatched)
    }

    /// Start the poll loop; returns after `shutdown` (or [`Self::shutdown`])
    /// fires and in-flight executions drained
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let stop = self.stop_token();
        let interval = tokio::time::Duration::from_secs(self.inner.config.check_interval_secs.max(1));
        info!(interval_secs = interval.as_secs(), "Schedule manager starting");

        if let Err(e) = self.check_and_dispatch().await {
            error!("Scheduler check failed: {}", e);
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.check_and_dispatch().await {
                        error!("Scheduler check failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Schedule manager shutting down");
                    break;
                }
                _ = stop.cancelled() => {
                    info!("Schedule manager stopped");
                    break;
                }
            }
        }

        let drain = tokio::time::Duration::from_secs(self.inner.config.drain_timeout_secs);
        self.wait_idle(drain).await;
        Ok(())
    }

    /// Stop any running poll loop and wait for executions to drain
    pub async fn shutdown(&self) {
        self.stop_token().cancel();
        let drain = tokio::time::Duration::from_secs(self.inner.config.drain_timeout_secs);
        self.wait_idle(drain).await;
    }

    /// Stop the poll loop and reload the collection from the store
    pub async fn reset(&self) -> Result<()> {
        {
            let mut stop = self.inner.stop.lock().unwrap_or_else(PoisonError::into_inner);
            stop.cancel();
            *stop = CancellationToken::new();
        }
        let reloaded = self.inner.store.load().await?;
        let count = reloaded.len();
        *self.inner.tasks.write().await = reloaded;
        info!(count, "Schedule manager reset");
        self.inner.events.publish(SchedulerEvent::TasksChanged);
        Ok(())
    }

    /// Wait until no execution is in flight; false on timeout
    pub async fn wait_idle(&self, timeout: tokio::time::Duration) -> bool {
        let start = tokio::time::Instant::now();
        loop {
            let count = self.running_count();
            if count == 0 {
                return true;
            }
            if start.elapsed() > timeout {
                warn!("Timeout waiting for {} running tasks", count);
                return false;
            }
            debug!("Waiting for {} running tasks to complete...", count);
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
    }

    /// Merge tasks from a store document; colliding ids get fresh ones
    pub async fn import_tasks(&self, path: &Path) -> Result<usize> {
        let imported = store::read_document(path).await?;
        for task in &imported {
            validate_task(task)?;
        }
        let count = imported.len();
        {
            let mut tasks = self.inner.tasks.write().await;
            let now = to_local(Utc::now());
            for mut task in imported {
                if tasks.iter().any(|t| t.id == task.id) {
                    task.id = Uuid::new_v4();
                }
                if task.enabled && task.next_run_at.is_none() {
                    task.schedule(now);
                    disable_if_unschedulable(&mut task);
                }
                tasks.push(task);
            }
        }
        info!(count, path = %path.display(), "Imported tasks");
        self.persist_and_notify().await?;
        Ok(count)
    }

    /// Write the collection to another path
    pub async fn export_tasks(&self, path: &Path) -> Result<usize> {
        let tasks = self.inner.tasks.read().await;
        store::write_document(path, &tasks).await?;
        info!(count = tasks.len(), path = %path.display(), "Exported tasks");
        Ok(tasks.len())
    }

    /// Claim a task seen due at `now` and spawn its execution.
    ///
    /// The task is re-read after the claim: a run that finished since the
    /// scan has already advanced the schedule.
    async fn dispatch(&self, task_id: Uuid, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let Some(guard) = self.try_claim(task_id, Trigger::Scheduled) else {
            debug!(task_id = %task_id, "Task still executing, skipping this cycle");
            return None;
        };
        let Some(task) = self.due_task(task_id, now).await else {
            debug!(task_id = %task_id, "Task no longer due, skipping");
            drop(guard);
            return None;
        };
        let manager = self.clone();
        Some(tokio::spawn(async move {
            let prepared = manager.prepare(&task).await.map_err(|e| {
                warn!(task_id = %task.id, error = %e, "Scheduled run rejected");
                e.to_string()
            });
            manager.execute(guard, task, Trigger::Scheduled, prepared).await;
        }))
    }

    async fn due_task(&self, task_id: Uuid, now: DateTime<Utc>) -> Option<ScheduledTask> {
        self.inner
            .tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == task_id && t.is_due(now))
            .cloned()
    }

    fn stop_token(&self) -> CancellationToken {
        self.inner
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn try_claim(&self, task_id: Uuid, trigger: Trigger) -> Option<RunningGuard> {
        let mut running = self.running();
        if let Some(existing) = running.get(&task_id) {
            debug!(
                task_id = %task_id,
                started_at = %existing.started_at,
                trigger = ?existing.trigger,
                "Task already running"
            );
            return None;
        }
        running.insert(
            task_id,
            RunningTask {
                started_at: Utc::now(),
                trigger,
            },
        );
        Some(RunningGuard {
            inner: Arc::clone(&self.inner),
            task_id,
        })
    }

    /// Check credentials and record source, resolving secrets
    async fn prepare(&self, task: &ScheduledTask) -> Result<JobRequest> {
        let refs = &task.job.credentials;
        if refs.is_incomplete() {
            return Err(SchedulerError::Precondition(
                "Credential references are not configured".to_string(),
            ));
        }
        let credentials = resolve_pair(self.inner.credentials.as_ref(), refs)
            .map_err(|e| SchedulerError::Precondition(format!("Credentials unavailable: {e}")))?;

        let source = &task.job.source;
        let meta = tokio::fs::metadata(source).await.map_err(|_| {
            SchedulerError::Precondition(format!("Record source not found: {}", source.display()))
        })?;
        if !meta.is_file() {
            return Err(SchedulerError::Precondition(format!(
                "Record source is not a file: {}",
                source.display()
            )));
        }
        if meta.len() == 0 {
            return Err(SchedulerError::Precondition(format!(
                "Record source is empty: {}",
                source.display()
            )));
        }

        Ok(JobRequest {
            task_id: task.id,
            task_name: task.name.clone(),
            params: task.job.clone(),
            credentials,
        })
    }

    /// Run the job (when prepared) and record the outcome
    async fn execute(
        &self,
        guard: RunningGuard,
        task: ScheduledTask,
        trigger: Trigger,
        prepared: std::result::Result<JobRequest, String>,
    ) -> JobReport {
        let report = match prepared {
            Ok(request) => {
                info!(task_id = %task.id, name = %task.name, ?trigger, "Executing task");
                self.inner.events.publish(SchedulerEvent::ExecutionStarted {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    trigger,
                });
                match (self.inner.executor)(request).await {
                    Ok(report) => report,
                    Err(e) => {
                        error!(task_id = %task.id, error = %e, "Task execution failed");
                        JobReport::failure(format!("Error: {e}"))
                    }
                }
            }
            Err(reason) => JobReport::failure(reason),
        };

        self.record_outcome(task.id, trigger, &report).await;
        drop(guard);
        report
    }

    /// Scheduled outcomes are announced per poll cycle by `check_and_dispatch`
    async fn record_outcome(&self, task_id: Uuid, trigger: Trigger, report: &JobReport) {
        {
            let mut tasks = self.inner.tasks.write().await;
            match tasks.iter_mut().find(|t| t.id == task_id) {
                Some(task) => {
                    task.record_run(Utc::now(), report.success, report.summary.clone());
                    info!(
                        task_id = %task_id,
                        success = report.success,
                        next_run_at = ?task.next_run_at,
                        enabled = task.enabled,
                        "Task completed: {}",
                        report.summary
                    );
                }
                None => {
                    warn!(task_id = %task_id, "Task removed while executing, outcome dropped");
                    return;
                }
            }
        }
        self.inner.events.publish(SchedulerEvent::ExecutionFinished {
            task_id,
            success: report.success,
            summary: report.summary.clone(),
        });
        let persisted = match trigger {
            Trigger::Scheduled => self.persist().await,
            Trigger::Manual => self.persist_and_notify().await,
        };
        if let Err(e) = persisted {
            error!(task_id = %task_id, "Failed to persist task outcome: {}", e);
        }
    }

    /// Attach a rejection message without counting a run
    async fn record_rejection(&self, task_id: Uuid, message: String) {
        {
            let mut tasks = self.inner.tasks.write().await;
            let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
                return;
            };
            task.last_run_successful = Some(false);
            task.last_run_result = Some(message);
        }
        if let Err(e) = self.persist_and_notify().await {
            error!(task_id = %task_id, "Failed to persist task rejection: {}", e);
        }
    }

    async fn persist(&self) -> Result<()> {
        let tasks = self.inner.tasks.read().await;
        self.inner.store.save(&tasks).await
    }

    async fn persist_and_notify(&self) -> Result<()> {
        self.persist().await?;
        self.inner.events.publish(SchedulerEvent::TasksChanged);
        Ok(())
    }
}

fn validate_task(task: &ScheduledTask) -> Result<()> {
    if task.name.trim().is_empty() {
        return Err(SchedulerError::InvalidConfig(
            "Task name must not be empty".to_string(),
        ));
    }
    task.recurrence.validate()
}

/// Compute the next run of an enabled task; an enabled task must have one
fn apply_schedule(task: &mut ScheduledTask, now: NaiveDateTime) -> Result<()> {
    if !task.enabled {
        task.next_run_at = None;
        return Ok(());
    }
    task.schedule(now);
    if task.next_run_at.is_none() {
        return Err(SchedulerError::InvalidConfig(
            "Run time is in the past".to_string(),
        ));
    }
    Ok(())
}

fn disable_if_unschedulable(task: &mut ScheduledTask) {
    if task.enabled && task.next_run_at.is_none() {
        warn!(task_id = %task.id, name = %task.name, "Task has no future run time, disabling");
        task.enabled = false;
    }
}

/// Builder for creating ScheduleManager
#[derive(Default)]
pub struct ScheduleManagerBuilder {
    store: Option<SchedulerStore>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    executor: Option<JobExecutor>,
    config: SchedulerConfig,
}

impl ScheduleManagerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store
    pub fn store(mut self, store: SchedulerStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the credential provider
    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Set the executor
    pub fn executor(mut self, executor: JobExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the store and build the manager
    pub async fn build(self) -> Result<ScheduleManager> {
        let store = self
            .store
            .ok_or_else(|| SchedulerError::InvalidConfig("Store is required".to_string()))?;
        let credentials = self.credentials.ok_or_else(|| {
            SchedulerError::InvalidConfig("Credential provider is required".to_string())
        })?;
        let executor = self
            .executor
            .ok_or_else(|| SchedulerError::InvalidConfig("Executor is required".to_string()))?;

        ScheduleManager::load(store, credentials, executor, self.config).await
    }
}

#[cfg(test)]
mod tests;
