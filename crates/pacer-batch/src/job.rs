//! Bridge from scheduled job requests to batch runs

use pacer_core::scheduler::{JobExecutor, JobFuture, JobParams, JobReport, JobRequest, SchedulerError};
use std::sync::Arc;
use tracing::info;

use crate::runner::{BatchJob, BatchRunner};
use crate::source::RecordShape;

impl From<&JobParams> for RecordShape {
    fn from(params: &JobParams) -> Self {
        if params.has_secondary_key {
            Self::with_secondary(params.default_secondary_key.clone())
        } else {
            Self::primary_only()
        }
    }
}

impl From<JobRequest> for BatchJob {
    fn from(request: JobRequest) -> Self {
        Self {
            shape: RecordShape::from(&request.params),
            source: request.params.source,
            credentials: request.credentials,
        }
    }
}

/// Executor that runs each scheduled job through `runner`.
///
/// A batch that completes reports success only when no record failed.
/// Source and output failures surface as execution errors.
pub fn job_executor(runner: Arc<BatchRunner>) -> JobExecutor {
    Arc::new(move |request: JobRequest| -> JobFuture {
        let runner = runner.clone();
        Box::pin(async move {
            let task_id = request.task_id;
            let task_name = request.task_name.clone();
            info!(task_id = %task_id, task = %task_name, "Running batch job");

            let job = BatchJob::from(request);
            let outcome = runner
                .run(&job)
                .await
                .map_err(|e| SchedulerError::Execution(e.to_string()))?;

            Ok(JobReport {
                success: outcome.is_success(),
                summary: outcome.summary(),
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pacer_client::{CallOutcome, RecordFields, RecordService};
    use pacer_core::credentials::{CredentialPair, CredentialRef};
    use tempfile::TempDir;
    use uuid::Uuid;

    struct EchoService;

    #[async_trait]
    impl RecordService for EchoService {
        async fn lookup(
            &self,
            primary_key: &str,
            _credentials: &CredentialPair,
        ) -> pacer_client::Result<CallOutcome> {
            if primary_key == "bad" {
                return Ok(CallOutcome::Rejected {
                    code: None,
                    message: "record not found".to_string(),
                });
            }
            Ok(CallOutcome::Success(RecordFields {
                status: "OK".to_string(),
                fields: Default::default(),
            }))
        }

        async fn refresh(
            &self,
            _secondary_key: &str,
            _credentials: &CredentialPair,
        ) -> pacer_client::Result<CallOutcome> {
            Ok(CallOutcome::Rejected {
                code: None,
                message: "unused".to_string(),
            })
        }
    }

    fn request(params: JobParams) -> JobRequest {
        JobRequest {
            task_id: Uuid::new_v4(),
            task_name: "nightly".to_string(),
            params,
            credentials: CredentialPair::new("k", "s"),
        }
    }

    fn executor() -> JobExecutor {
        job_executor(Arc::new(BatchRunner::new(Arc::new(EchoService))))
    }

    #[test]
    fn test_shape_from_params() {
        let refs = CredentialRef::new("key", "secret");
        let plain = JobParams::new("records.txt", refs.clone());
        assert_eq!(RecordShape::from(&plain), RecordShape::primary_only());

        let paired = JobParams::new("records.txt", refs).with_secondary_key(Some("G-0".to_string()));
        let shape = RecordShape::from(&paired);
        assert!(shape.has_secondary_key);
        assert_eq!(shape.default_secondary_key.as_deref(), Some("G-0"));
    }

    #[tokio::test]
    async fn test_report_reflects_failures() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("records.txt");
        let refs = CredentialRef::new("key", "secret");
        let run = executor();

        std::fs::write(&source, "A-1\nA-2\n").unwrap();
        let report = run(request(JobParams::new(&source, refs.clone()))).await.unwrap();
        assert!(report.success);
        assert!(report.summary.starts_with("Processed 2 records: 2 succeeded, 0 failed"));

        std::fs::write(&source, "A-1\nbad\n").unwrap();
        let report = run(request(JobParams::new(&source, refs))).await.unwrap();
        assert!(!report.success);
        assert!(report.summary.contains("1 failed"));
    }

    #[tokio::test]
    async fn test_missing_source_is_an_execution_error() {
        let dir = TempDir::new().unwrap();
        let params = JobParams::new(dir.path().join("gone.txt"), CredentialRef::new("k", "s"));

        let err = executor()(request(params)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Execution(_)));
        assert!(err.to_string().contains("record source not found"));
    }
}
