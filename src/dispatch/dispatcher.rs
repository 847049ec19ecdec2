use crate::dispatch::collector::{Failure, FailureSender};
use crate::dispatch::source::JobSource;
use crate::job::descriptor::JobDescriptor;
use crate::job::error::JobError;
use crate::job::process::{Job, JobContext};
use crate::runtime::telemetry::Telemetry;
use futures::FutureExt;
use std::any::Any;
use std::io::Read;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Counts reported once the dispatcher has drained every job it launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub source_failed: bool,
}

/// Fans job descriptors out into independent tokio tasks.
pub struct JobDispatcher {
    context: Arc<JobContext>,
    telemetry: Arc<Telemetry>,
    limiter: Option<Arc<Semaphore>>,
}

impl JobDispatcher {
    pub fn new(context: JobContext, telemetry: Arc<Telemetry>) -> Self {
        Self {
            context: Arc::new(context),
            telemetry,
            limiter: None,
        }
    }

    /// Caps the number of jobs running at once. While the cap is reached the
    /// dispatcher stops pulling records until a job finishes.
    pub fn with_max_concurrent_jobs(mut self, max_jobs: Option<usize>) -> Self {
        self.limiter = max_jobs.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Launches one task per descriptor without waiting on earlier jobs, then
    /// waits for every launched task. A malformed record stops further pulls
    /// but already running jobs are still awaited. `failures` is dropped on
    /// return, together with every clone held by the job tasks.
    pub async fn dispatch<R: Read>(
        self,
        mut source: JobSource<R>,
        failures: FailureSender,
    ) -> DispatchSummary {
        let mut jobs = JoinSet::new();
        let mut summary = DispatchSummary::default();

        while let Some(next) = source.next_descriptor() {
            let descriptor = match next {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    tracing::warn!(
                        record = err.record(),
                        error = %err,
                        "job source yielded a malformed record; no further jobs will be launched"
                    );
                    self.telemetry.record_source_error();
                    summary.source_failed = true;
                    failures.report(Failure::Source(err));
                    break;
                }
            };

            let permit = match self.acquire_permit().await {
                Some(permit) => permit,
                None => break,
            };

            summary.launched += 1;
            self.telemetry.record_job_launched();
            tracing::debug!(
                job = summary.launched,
                api_method = %descriptor.api_method(),
                "launching job"
            );

            jobs.spawn(run_job(
                descriptor,
                self.context.clone(),
                self.telemetry.clone(),
                failures.clone(),
                permit,
            ));
        }

        tracing::debug!(
            launched = summary.launched,
            "job source drained; waiting for running jobs"
        );

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(err) => {
                    summary.failed += 1;
                    self.telemetry.record_job_failed();
                    tracing::error!(error = %err, "job task did not complete");
                    failures.report(Failure::job(
                        "<unknown>",
                        JobError::Panicked(err.to_string()),
                    ));
                }
            }
        }

        summary
    }

    async fn acquire_permit(&self) -> Option<Option<OwnedSemaphorePermit>> {
        match &self.limiter {
            None => Some(None),
            Some(limiter) => match limiter.clone().acquire_owned().await {
                Ok(permit) => Some(Some(permit)),
                Err(err) => {
                    tracing::error!(error = %err, "job limiter closed; stopping dispatch");
                    None
                }
            },
        }
    }
}

/// Runs one job to completion inside its own task. Returns whether it succeeded.
async fn run_job(
    descriptor: JobDescriptor,
    context: Arc<JobContext>,
    telemetry: Arc<Telemetry>,
    failures: FailureSender,
    _permit: Option<OwnedSemaphorePermit>,
) -> bool {
    let api_method = descriptor.api_method().to_owned();
    let job = Job::new(descriptor);

    let outcome = AssertUnwindSafe(job.run(&context)).catch_unwind().await;

    let error = match outcome {
        Ok(Ok(report)) => {
            telemetry.record_job_succeeded();
            tracing::info!(
                api_method = %report.api_method,
                chain_id = %report.chain_id,
                entry_hash = %report.entry_hash,
                captured_at = report.captured_at,
                "response anchored"
            );
            return true;
        }
        Ok(Err(err)) => err,
        Err(panic_payload) => {
            let message = panic_message(panic_payload.as_ref());
            tracing::error!(api_method = %api_method, panic = %message, "job panicked");
            JobError::Panicked(message)
        }
    };

    telemetry.record_job_failed();
    failures.report(Failure::job(api_method, error));
    false
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
