use super::*;
use async_trait::async_trait;
use pacer_client::{ClientError, RecordFields, TransientFailure};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Record service answering from the key text
///
/// `missing*` is rejected, `boom*` exhausts retries, anything else succeeds.
#[derive(Default)]
struct FakeService {
    calls: Mutex<Vec<String>>,
}

impl FakeService {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(key: &str) -> pacer_client::Result<CallOutcome> {
        if key.starts_with("missing") {
            Ok(CallOutcome::Rejected {
                code: Some("NOT_FOUND".to_string()),
                message: "record not found, check the key".to_string(),
            })
        } else if key.starts_with("boom") {
            Err(ClientError::RetriesExhausted {
                attempts: 3,
                last: TransientFailure::ServerError(500),
            })
        } else {
            Ok(CallOutcome::Success(RecordFields {
                status: "ACTIVE".to_string(),
                fields: [format!("name-{key}"), "10.00".to_string(), "2026-03-01".to_string()],
            }))
        }
    }
}

#[async_trait]
impl RecordService for FakeService {
    async fn lookup(
        &self,
        primary_key: &str,
        _credentials: &CredentialPair,
    ) -> pacer_client::Result<CallOutcome> {
        self.calls.lock().unwrap().push(format!("lookup:{primary_key}"));
        Self::answer(primary_key)
    }

    async fn refresh(
        &self,
        secondary_key: &str,
        _credentials: &CredentialPair,
    ) -> pacer_client::Result<CallOutcome> {
        self.calls.lock().unwrap().push(format!("refresh:{secondary_key}"));
        Self::answer(secondary_key)
    }
}

fn setup(contents: &str) -> (TempDir, PathBuf, Arc<FakeService>, BatchRunner) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("records.txt");
    std::fs::write(&source, contents).unwrap();
    let service = Arc::new(FakeService::default());
    let runner = BatchRunner::new(service.clone());
    (dir, source, service, runner)
}

fn creds() -> CredentialPair {
    CredentialPair::new("key", "secret")
}

#[tokio::test]
async fn test_empty_line_is_a_failed_row() {
    let (dir, source, service, runner) = setup("A-1\n\nA-3\n");

    let outcome = assert_ok!(runner.run(&BatchJob::new(&source, creds())).await);

    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.failure_count, 1);
    assert_eq!(
        outcome.rows[1].result,
        RowResult::Error("empty identifier".to_string())
    );
    assert_eq!(service.calls(), vec!["lookup:A-1", "lookup:A-3"]);

    assert_eq!(outcome.output_path, dir.path().join(DEFAULT_OUTPUT_FILE));
    let doc = std::fs::read_to_string(&outcome.output_path).unwrap();
    let lines: Vec<&str> = doc.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "PrimaryKey,Status,Field1,Field2,Field3");
    assert_eq!(lines[1], "A-1,ACTIVE,name-A-1,10.00,2026-03-01");
    assert_eq!(lines[2], ",ERROR,empty identifier,,");
}

#[tokio::test]
async fn test_rejections_and_errors_are_isolated() {
    let (_dir, source, _service, runner) = setup("missing-1\nboom-2\nA-3\n");

    let outcome = runner.run(&BatchJob::new(&source, creds())).await.unwrap();

    assert_eq!(outcome.success_count, 1);
    assert_eq!(outcome.failure_count, 2);
    assert!(!outcome.is_success());

    let doc = std::fs::read_to_string(&outcome.output_path).unwrap();
    assert!(doc.contains("missing-1,ERROR,\"record not found, check the key\",,"));
    assert!(doc.contains("boom-2,ERROR,request failed after 3 attempts"));
}

#[tokio::test]
async fn test_secondary_key_refreshed_first() {
    let (_dir, source, service, runner) = setup("G-1,A-1\nA-2\nboom-g,A-3\n");
    let job = BatchJob::new(&source, creds())
        .with_shape(RecordShape::with_secondary(Some("G-default".to_string())));

    let outcome = runner.run(&job).await.unwrap();

    // a failed refresh does not fail the record
    assert_eq!(outcome.success_count, 3);
    assert_eq!(
        service.calls(),
        vec![
            "refresh:G-1",
            "lookup:A-1",
            "refresh:G-default",
            "lookup:A-2",
            "refresh:boom-g",
            "lookup:A-3",
        ]
    );

    let doc = std::fs::read_to_string(&outcome.output_path).unwrap();
    assert!(doc.starts_with("SecondaryKey,PrimaryKey,Status,"));
    assert!(doc.contains("\nG-default,A-2,ACTIVE,"));
}

#[tokio::test]
async fn test_missing_source_aborts_without_calls() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(FakeService::default());
    let runner = BatchRunner::new(service.clone());

    let err = assert_err!(
        runner
            .run(&BatchJob::new(dir.path().join("absent.txt"), creds()))
            .await
    );

    assert!(matches!(err, BatchError::SourceMissing(_)));
    assert!(service.calls().is_empty());
    assert!(!dir.path().join(DEFAULT_OUTPUT_FILE).exists());
}

#[tokio::test]
async fn test_empty_source_aborts() {
    let (_dir, source, service, runner) = setup("\n\n");

    let err = assert_err!(runner.run(&BatchJob::new(&source, creds())).await);

    assert!(matches!(err, BatchError::SourceEmpty(_)));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_progress_reported_per_record() {
    let (_dir, source, _service, runner) = setup("A-1\nmissing\nA-3\n");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let runner = runner.with_progress(Arc::new(move |p: BatchProgress| {
        sink.lock().unwrap().push(p);
    }));

    runner.run(&BatchJob::new(&source, creds())).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[2],
        BatchProgress {
            processed: 3,
            total: 3,
            succeeded: 2,
            failed: 1
        }
    );
}

#[tokio::test]
async fn test_custom_output_file() {
    let (dir, source, _service, runner) = setup("A-1\n");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let runner = runner
        .with_output_file("out.csv")
        .with_progress(Arc::new(move |_: BatchProgress| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

    let outcome = runner.run(&BatchJob::new(&source, creds())).await.unwrap();

    assert_eq!(outcome.output_path, dir.path().join("out.csv"));
    assert!(outcome.output_path.exists());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
