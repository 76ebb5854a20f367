use futures::FutureExt;
use tracing::{Span, instrument};

use std::{panic::AssertUnwindSafe, sync::Arc};

use super::{
    alarm::AlarmRequest, current::CurrentJob, error::*, job_info::JobInfo,
    registry::JobHandlerRegistry, runner::*, scheduler::AlarmScheduler,
};

/// Runs one fired alarm and books the retry when the handler does not complete.
pub(crate) struct JobDispatcher {
    registry: Arc<JobHandlerRegistry>,
    scheduler: Arc<AlarmScheduler>,
    shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    instance_id: uuid::Uuid,
}

impl JobDispatcher {
    pub fn new(
        registry: Arc<JobHandlerRegistry>,
        scheduler: Arc<AlarmScheduler>,
        shutdown_rx: tokio::sync::broadcast::Receiver<()>,
        instance_id: uuid::Uuid,
    ) -> Self {
        Self {
            registry,
            scheduler,
            shutdown_rx,
            instance_id,
        }
    }

    #[instrument(name = "job.execute_job", skip_all,
        fields(job_tag, executor_id, retry_count, error, error.level, error.message, conclusion, will_retry),
    err)]
    pub async fn execute_job(self, fired: AlarmRequest) -> Result<(), JobError> {
        let span = Span::current();
        span.record("executor_id", tracing::field::display(self.instance_id));
        span.record("retry_count", fired.retry_count);
        let job = JobInfo::from_bundle(&fired.payload)?;
        if let Some(tag) = job.tag() {
            span.record("job_tag", tracing::field::display(tag));
        }
        let handler = self.registry.handler_for(job.tag())?;
        let current_job = CurrentJob::new(job.clone(), fired.retry_count, self.shutdown_rx);

        match Self::dispatch_job(handler, current_job).await {
            Ok(JobResult::Complete) => {
                span.record("conclusion", "Complete");
                Ok(())
            }
            Ok(JobResult::Retry) => {
                span.record("conclusion", "Retry");
                Self::retry_job(&self.scheduler, &job, fired.retry_count).map(|_| ())
            }
            Err(e) => {
                span.record("conclusion", "Error");
                let retried = Self::retry_job(&self.scheduler, &job, fired.retry_count);
                let level = match retried {
                    Ok(true) => tracing::Level::WARN,
                    _ => tracing::Level::ERROR,
                };
                span.record("error.level", tracing::field::display(level));
                let will_retry = retried?;
                tracing::debug!(error = %e, will_retry, "job execution failed");
                Ok(())
            }
        }
    }

    async fn dispatch_job(
        handler: Arc<dyn JobHandler>,
        current_job: CurrentJob,
    ) -> Result<JobResult, JobError> {
        match AssertUnwindSafe(handler.run(current_job))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                let span = Span::current();
                let error = e.to_string();
                span.record("error", true);
                span.record("error.message", tracing::field::display(&error));
                Err(JobError::JobExecutionError(error))
            }
            Err(panic) => {
                let span = Span::current();
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic payload".to_string()
                };

                span.record("error", true);
                span.record(
                    "error.message",
                    tracing::field::display(&format!("Panic: {message}")),
                );

                tracing::error!(
                    target: "job.panic",
                    panic_message = %message,
                    panic_backtrace = ?std::backtrace::Backtrace::capture(),
                    "Job panicked during execution"
                );

                Err(JobError::JobExecutionError(format!(
                    "Job panicked: {message}"
                )))
            }
        }
    }

    fn retry_job(
        scheduler: &AlarmScheduler,
        job: &JobInfo,
        retry_count: u32,
    ) -> Result<bool, JobError> {
        let span = Span::current();
        match scheduler.reschedule(job, retry_count) {
            Ok(()) => {
                span.record("will_retry", true);
                Ok(true)
            }
            Err(SchedulerError::RetryLimitReached {
                retry_count,
                max_retries,
            }) => {
                span.record("will_retry", false);
                tracing::error!(
                    retry_count,
                    max_retries,
                    "job abandoned after exhausting retries"
                );
                Ok(false)
            }
            Err(e) => {
                span.record("will_retry", false);
                Err(e.into())
            }
        }
    }
}
