use super::*;
use crate::credentials::{CredentialError, CredentialRef, MockCredentialProvider, SecureString};
use crate::scheduler::recurrence::Recurrence;
use crate::scheduler::types::{from_local, JobParams};
use chrono::{Duration, Local};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_test::{assert_err, assert_ok};

struct TestContext {
    manager: ScheduleManager,
    calls: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
    source: PathBuf,
    store_path: PathBuf,
    _dir: TempDir,
}

/// Executor that counts calls; jobs named "gated" wait for a gate permit
fn test_executor(calls: Arc<AtomicUsize>, gate: Arc<Semaphore>) -> JobExecutor {
    Arc::new(move |request: JobRequest| -> JobFuture {
        let calls = calls.clone();
        let gate = gate.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if request.task_name == "gated" {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            let report = if request.task_name.starts_with("failing") {
                JobReport::failure("Completed: 0 ok, 2 failed")
            } else {
                assert_eq!(request.credentials.key.expose(), "value-acct-key");
                JobReport::success(format!("ran {}", request.task_name))
            };
            Ok::<_, SchedulerError>(report)
        })
    })
}

fn resolving_provider() -> Arc<dyn CredentialProvider> {
    let mut mock = MockCredentialProvider::new();
    mock.expect_secret()
        .returning(|name| Ok(SecureString::new(format!("value-{name}"))));
    Arc::new(mock)
}

async fn create_test_context_with(
    provider: Arc<dyn CredentialProvider>,
    seeded: Vec<ScheduledTask>,
) -> TestContext {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\nA2\n").unwrap();
    let store_path = dir.path().join("tasks.json");
    if !seeded.is_empty() {
        store::write_document(&store_path, &seeded).await.unwrap();
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let manager = ScheduleManager::builder()
        .store(SchedulerStore::from_path(&store_path).unwrap())
        .credentials(provider)
        .executor(test_executor(calls.clone(), gate.clone()))
        .config(SchedulerConfig::new().with_check_interval(1).with_drain_timeout(5))
        .build()
        .await
        .unwrap();

    TestContext {
        manager,
        calls,
        gate,
        source,
        store_path,
        _dir: dir,
    }
}

async fn create_test_context() -> TestContext {
    create_test_context_with(resolving_provider(), Vec::new()).await
}

fn daily_task(name: &str, source: &Path) -> ScheduledTask {
    let start = Local::now().naive_local() + Duration::hours(1);
    ScheduledTask::new(
        name,
        JobParams::new(source, CredentialRef::new("acct-key", "acct-secret")),
        Recurrence::daily(start, 1),
    )
}

/// A task whose next run time has already passed
fn due_task(name: &str, source: &Path, recurrence: Recurrence) -> ScheduledTask {
    let mut task = ScheduledTask::new(
        name,
        JobParams::new(source, CredentialRef::new("acct-key", "acct-secret")),
        recurrence,
    );
    task.next_run_at = Some(Utc::now() - Duration::minutes(1));
    task
}

async fn wait_until_running(manager: &ScheduleManager, id: Uuid) {
    while !manager.is_running(id) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_add_and_list_tasks() {
    let ctx = create_test_context().await;

    let id = ctx
        .manager
        .add_task(daily_task("nightly", &ctx.source))
        .await
        .unwrap();

    let tasks = ctx.manager.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "nightly");
    assert!(tasks[0].next_run_at.unwrap() > Utc::now());
    assert_eq!(ctx.manager.status_of(id).await.unwrap(), TaskStatus::Pending);

    let persisted = store::read_document(&ctx.store_path).await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, id);
}

#[tokio::test]
async fn test_add_rejects_invalid_recurrence() {
    let ctx = create_test_context().await;
    let mut task = daily_task("broken", &ctx.source);
    task.recurrence.interval = 0;

    let result = ctx.manager.add_task(task).await;
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    assert!(ctx.manager.tasks().await.is_empty());
}

#[tokio::test]
async fn test_enable_disable_task() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("toggle", &ctx.source))
        .await
        .unwrap();

    ctx.manager.set_enabled(id, false).await.unwrap();
    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(!task.enabled);
    assert!(task.next_run_at.is_none());
    assert_eq!(ctx.manager.status_of(id).await.unwrap(), TaskStatus::Disabled);

    ctx.manager.set_enabled(id, true).await.unwrap();
    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(task.enabled);
    assert!(task.next_run_at.is_some());
}

#[tokio::test]
async fn test_update_keeps_history() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("edit-me", &ctx.source))
        .await
        .unwrap();
    assert!(ctx.manager.run_now(id).await.unwrap());

    let mut edited = ctx.manager.get_task(id).await.unwrap();
    edited.name = "edited".to_string();
    edited.run_count = 0;
    ctx.manager.update_task(edited).await.unwrap();

    let task = ctx.manager.get_task(id).await.unwrap();
    assert_eq!(task.name, "edited");
    assert_eq!(task.run_count, 1);
}

#[tokio::test]
async fn test_remove_task() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("remove", &ctx.source))
        .await
        .unwrap();

    ctx.manager.remove_task(id).await.unwrap();
    assert!(matches!(
        ctx.manager.get_task(id).await,
        Err(SchedulerError::TaskNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.remove_task(id).await,
        Err(SchedulerError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_run_now_records_outcome() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("manual", &ctx.source))
        .await
        .unwrap();

    assert!(ctx.manager.run_now(id).await.unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 1);

    let task = ctx.manager.get_task(id).await.unwrap();
    assert_eq!(task.last_run_successful, Some(true));
    assert_eq!(task.last_run_result.as_deref(), Some("ran manual"));
    assert_eq!(task.run_count, 1);
    assert!(task.last_run_at.is_some());
    assert!(task.next_run_at.unwrap() > Utc::now());

    let persisted = store::read_document(&ctx.store_path).await.unwrap();
    assert_eq!(persisted[0].run_count, 1);
}

#[tokio::test]
async fn test_run_now_unknown_task() {
    let ctx = create_test_context().await;
    assert!(matches!(
        ctx.manager.run_now(Uuid::new_v4()).await,
        Err(SchedulerError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn test_run_now_missing_source_skips_executor() {
    let ctx = create_test_context().await;
    let missing = ctx.source.with_file_name("missing.txt");
    let id = ctx
        .manager
        .add_task(daily_task("no-file", &missing))
        .await
        .unwrap();

    assert!(!ctx.manager.run_now(id).await.unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 0);

    let task = ctx.manager.get_task(id).await.unwrap();
    assert_eq!(task.last_run_successful, Some(false));
    assert!(task.last_run_result.unwrap().contains("not found"));
    assert_eq!(task.run_count, 0);
}

#[tokio::test]
async fn test_run_now_empty_source_skips_executor() {
    let ctx = create_test_context().await;
    std::fs::write(&ctx.source, "").unwrap();
    let id = ctx
        .manager
        .add_task(daily_task("empty-file", &ctx.source))
        .await
        .unwrap();

    assert!(!ctx.manager.run_now(id).await.unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 0);
    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(task.last_run_result.unwrap().contains("empty"));
}

#[tokio::test]
async fn test_run_now_blank_credential_refs_never_query_provider() {
    let mut mock = MockCredentialProvider::new();
    mock.expect_secret().never();
    let ctx = create_test_context_with(Arc::new(mock), Vec::new()).await;

    let mut task = daily_task("no-creds", &ctx.source);
    task.job.credentials = CredentialRef::new("", "acct-secret");
    let id = ctx.manager.add_task(task).await.unwrap();

    assert!(!ctx.manager.run_now(id).await.unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 0);
    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(task.last_run_result.unwrap().contains("Credential"));
}

#[tokio::test]
async fn test_run_now_unresolvable_credentials() {
    let mut mock = MockCredentialProvider::new();
    mock.expect_secret()
        .returning(|name| Err(CredentialError::NotFound(name.to_string())));
    let ctx = create_test_context_with(Arc::new(mock), Vec::new()).await;
    let id = ctx
        .manager
        .add_task(daily_task("bad-creds", &ctx.source))
        .await
        .unwrap();

    assert!(!ctx.manager.run_now(id).await.unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 0);
    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(task
        .last_run_result
        .unwrap()
        .starts_with("precondition failed: Credentials unavailable"));
}

#[tokio::test]
async fn test_once_task_disabled_after_failed_run() {
    let ctx = create_test_context().await;
    let at = Local::now().naive_local() + Duration::hours(2);
    let task = ScheduledTask::new(
        "failing-once",
        JobParams::new(&ctx.source, CredentialRef::new("acct-key", "acct-secret")),
        Recurrence::once(at),
    );
    let id = ctx.manager.add_task(task).await.unwrap();
    assert!(ctx.manager.get_task(id).await.unwrap().next_run_at.is_some());

    assert!(!ctx.manager.run_now(id).await.unwrap());

    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(!task.enabled);
    assert!(task.next_run_at.is_none());
    assert_eq!(task.run_count, 1);
    assert_eq!(task.failure_count, 1);
    assert_eq!(task.last_run_successful, Some(false));
}

#[tokio::test]
async fn test_poll_dispatches_due_tasks() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let at = Local::now().naive_local() - Duration::hours(1);
    let seeded = vec![
        due_task("once", &source, Recurrence::once(at)),
        due_task("daily", &source, Recurrence::daily(at, 1)),
    ];
    let ctx = create_test_context_with(resolving_provider(), seeded).await;

    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 2);
    assert!(ctx.manager.wait_idle(tokio::time::Duration::from_secs(5)).await);
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 2);

    for task in ctx.manager.tasks().await {
        assert_eq!(task.run_count, 1);
        assert_eq!(task.last_run_successful, Some(true));
        if task.name == "once" {
            assert!(!task.enabled);
            assert!(task.next_run_at.is_none());
        } else {
            assert!(task.next_run_at.unwrap() > Utc::now());
        }
    }

    // Nothing is due any more
    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 0);
}

#[tokio::test]
async fn test_poll_precondition_failure_still_advances_once_task() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone.txt");
    let at = Local::now().naive_local() - Duration::hours(1);
    let seeded = vec![due_task("once", &missing, Recurrence::once(at))];
    let ctx = create_test_context_with(resolving_provider(), seeded).await;

    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 1);
    assert!(ctx.manager.wait_idle(tokio::time::Duration::from_secs(5)).await);

    let task = &ctx.manager.tasks().await[0];
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 0);
    assert!(!task.enabled);
    assert_eq!(task.run_count, 1);
    assert_eq!(task.last_run_successful, Some(false));
    assert!(task.last_run_result.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_same_task_never_overlaps_but_others_run() {
    let ctx = create_test_context().await;
    let a = ctx
        .manager
        .add_task(daily_task("gated", &ctx.source))
        .await
        .unwrap();
    let b = ctx
        .manager
        .add_task(daily_task("free", &ctx.source))
        .await
        .unwrap();

    let manager = ctx.manager.clone();
    let first = tokio::spawn(async move { manager.run_now(a).await });
    wait_until_running(&ctx.manager, a).await;
    assert_eq!(ctx.manager.status_of(a).await.unwrap(), TaskStatus::Executing);

    assert!(matches!(
        ctx.manager.run_now(a).await,
        Err(SchedulerError::AlreadyRunning(id)) if id == a
    ));
    assert!(ctx.manager.run_now(b).await.unwrap());
    assert!(ctx.manager.is_running(a));

    ctx.gate.add_permits(1);
    assert!(first.await.unwrap().unwrap());
    assert!(!ctx.manager.is_running(a));
    assert_eq!(ctx.manager.get_task(a).await.unwrap().run_count, 1);
}

#[tokio::test]
async fn test_poll_skips_executing_task() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let at = Local::now().naive_local() - Duration::hours(1);
    let task = due_task("gated", &source, Recurrence::daily(at, 1));
    let id = task.id;
    let ctx = create_test_context_with(resolving_provider(), vec![task]).await;

    let manager = ctx.manager.clone();
    let manual = tokio::spawn(async move { manager.run_now(id).await });
    wait_until_running(&ctx.manager, id).await;

    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 0);

    ctx.gate.add_permits(1);
    assert!(manual.await.unwrap().unwrap());
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_events_published_for_execution() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("observed", &ctx.source))
        .await
        .unwrap();
    let mut rx = ctx.manager.subscribe();

    ctx.manager.run_now(id).await.unwrap();

    assert!(matches!(
        rx.recv().await.unwrap(),
        SchedulerEvent::ExecutionStarted { task_id, trigger: Trigger::Manual, .. } if task_id == id
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        SchedulerEvent::ExecutionFinished { success: true, .. }
    ));
    assert!(matches!(rx.recv().await.unwrap(), SchedulerEvent::TasksChanged));
}

#[tokio::test]
async fn test_export_then_import_assigns_fresh_ids() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("exported", &ctx.source))
        .await
        .unwrap();

    let export_path = ctx.source.with_file_name("export.json");
    assert_eq!(ctx.manager.export_tasks(&export_path).await.unwrap(), 1);
    assert_eq!(ctx.manager.import_tasks(&export_path).await.unwrap(), 1);

    let tasks = ctx.manager.tasks().await;
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().any(|t| t.id == id));
    assert!(tasks.iter().all(|t| t.name == "exported"));
    assert_ne!(tasks[0].id, tasks[1].id);
}

#[tokio::test]
async fn test_reset_reloads_from_store() {
    let ctx = create_test_context().await;
    ctx.manager
        .add_task(daily_task("transient", &ctx.source))
        .await
        .unwrap();

    store::write_document(&ctx.store_path, &[]).await.unwrap();
    ctx.manager.reset().await.unwrap();
    assert!(ctx.manager.tasks().await.is_empty());
}

#[tokio::test]
async fn test_run_loop_dispatches_and_stops() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let at = Local::now().naive_local() - Duration::hours(1);
    let seeded = vec![due_task("looped", &source, Recurrence::daily(at, 1))];
    let ctx = create_test_context_with(resolving_provider(), seeded).await;

    let token = CancellationToken::new();
    let manager = ctx.manager.clone();
    let handle = tokio::spawn({
        let token = token.clone();
        async move { manager.run(token).await }
    });

    while ctx.calls.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    token.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(ctx.manager.running_count(), 0);
    assert_eq!(ctx.manager.tasks().await[0].run_count, 1);
}

fn local_at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2030, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn fixed_task(recurrence: Recurrence) -> ScheduledTask {
    ScheduledTask::new(
        "fixed",
        JobParams::new("records.txt", CredentialRef::new("acct-key", "acct-secret")),
        recurrence,
    )
}

#[test]
fn test_early_run_keeps_todays_daily_slot() {
    let nine = local_at(4, 9, 0);
    let mut task = fixed_task(Recurrence::daily(nine, 1));
    task.schedule(local_at(4, 8, 0));
    assert_eq!(task.next_run_at.map(to_local), Some(nine));

    task.record_run(from_local(local_at(4, 8, 5)), true, "ok");
    assert_eq!(task.next_run_at.map(to_local), Some(nine));
    assert_eq!(task.run_count, 1);

    task.record_run(from_local(local_at(4, 9, 1)), true, "ok");
    assert_eq!(task.next_run_at.map(to_local), Some(local_at(5, 9, 0)));
}

#[test]
fn test_early_run_keeps_pending_hourly_slot() {
    let mut task = fixed_task(Recurrence::hourly(local_at(4, 9, 0), 1));
    task.schedule(local_at(4, 8, 0));
    assert_eq!(task.next_run_at.map(to_local), Some(local_at(4, 9, 0)));

    task.record_run(from_local(local_at(4, 8, 5)), true, "ok");
    assert_eq!(task.next_run_at.map(to_local), Some(local_at(4, 9, 0)));

    task.record_run(from_local(local_at(4, 9, 0)), true, "ok");
    assert_eq!(task.next_run_at.map(to_local), Some(local_at(4, 10, 0)));
}

#[tokio::test]
async fn test_run_now_ahead_of_schedule_keeps_next_run() {
    let ctx = create_test_context().await;
    let id = ctx
        .manager
        .add_task(daily_task("early", &ctx.source))
        .await
        .unwrap();
    let scheduled = ctx.manager.get_task(id).await.unwrap().next_run_at;
    assert!(scheduled.is_some());

    assert!(ctx.manager.run_now(id).await.unwrap());

    let task = ctx.manager.get_task(id).await.unwrap();
    assert_eq!(task.run_count, 1);
    assert_eq!(task.next_run_at, scheduled);
}

#[tokio::test]
async fn test_add_rejects_once_task_in_the_past() {
    let ctx = create_test_context().await;
    let past = Local::now().naive_local() - Duration::hours(1);
    let task = ScheduledTask::new(
        "stale-once",
        JobParams::new(&ctx.source, CredentialRef::new("acct-key", "acct-secret")),
        Recurrence::once(past),
    );

    let result = ctx.manager.add_task(task).await;
    assert!(matches!(
        result,
        Err(SchedulerError::InvalidConfig(ref msg)) if msg.contains("in the past")
    ));
    assert!(ctx.manager.tasks().await.is_empty());
}

#[tokio::test]
async fn test_moving_once_task_into_the_past_is_rejected() {
    let ctx = create_test_context().await;
    let soon = Local::now().naive_local() + Duration::hours(1);
    let task = ScheduledTask::new(
        "one-shot",
        JobParams::new(&ctx.source, CredentialRef::new("acct-key", "acct-secret")),
        Recurrence::once(soon),
    );
    let id = ctx.manager.add_task(task).await.unwrap();
    assert!(ctx.manager.run_now(id).await.unwrap());
    assert!(!ctx.manager.get_task(id).await.unwrap().enabled);

    // still pending, so re-enabling schedules it again
    assert_ok!(ctx.manager.set_enabled(id, true).await);
    assert!(ctx.manager.get_task(id).await.unwrap().next_run_at.is_some());

    let mut edited = ctx.manager.get_task(id).await.unwrap();
    edited.recurrence = Recurrence::once(Local::now().naive_local() - Duration::hours(1));
    assert_err!(ctx.manager.update_task(edited).await);

    let task = ctx.manager.get_task(id).await.unwrap();
    assert!(task.enabled);
    assert_eq!(task.recurrence.frequency, crate::scheduler::recurrence::Frequency::Once);
    assert!(task.next_run_at.is_some());
}

#[tokio::test]
async fn test_load_disables_enabled_task_without_future_run() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let mut stale = ScheduledTask::new(
        "stale-once",
        JobParams::new(&source, CredentialRef::new("acct-key", "acct-secret")),
        Recurrence::once(Local::now().naive_local() - Duration::days(2)),
    );
    stale.next_run_at = None;
    let ctx = create_test_context_with(resolving_provider(), vec![stale]).await;

    let task = &ctx.manager.tasks().await[0];
    assert!(!task.enabled);
    assert_eq!(task.status(Utc::now(), false), TaskStatus::Disabled);
}

#[tokio::test]
async fn test_finished_run_is_not_dispatched_again_from_stale_scan() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let at = Local::now().naive_local() - Duration::hours(1);
    let task = due_task("daily", &source, Recurrence::daily(at, 1));
    let id = task.id;
    let ctx = create_test_context_with(resolving_provider(), vec![task]).await;

    let scanned_at = Utc::now();
    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 1);
    assert!(ctx.manager.wait_idle(tokio::time::Duration::from_secs(5)).await);

    // the scan at `scanned_at` saw the task due, but its run has since finished
    assert!(ctx.manager.dispatch(id, scanned_at).await.is_none());
    assert!(!ctx.manager.is_running(id));
    assert_eq!(ctx.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.manager.get_task(id).await.unwrap().run_count, 1);
}

#[tokio::test]
async fn test_poll_cycle_notifies_observers_once() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, "A1\n").unwrap();
    let at = Local::now().naive_local() - Duration::hours(1);
    let seeded = vec![
        due_task("first", &source, Recurrence::daily(at, 1)),
        due_task("second", &source, Recurrence::daily(at, 1)),
    ];
    let ctx = create_test_context_with(resolving_provider(), seeded).await;
    let mut rx = ctx.manager.subscribe();

    assert_eq!(ctx.manager.check_and_dispatch().await.unwrap(), 2);

    let mut finished = 0;
    loop {
        match rx.recv().await.unwrap() {
            SchedulerEvent::ExecutionFinished { .. } => finished += 1,
            SchedulerEvent::TasksChanged => break,
            SchedulerEvent::ExecutionStarted { .. } => {}
        }
    }
    assert_eq!(finished, 2);
    assert!(rx.try_recv().is_err());
}
