//! Execution-time helpers available to running jobs.

use serde::de::DeserializeOwned;

use crate::job_info::{JobInfo, JobTag};

/// Context provided to a [`JobHandler`](crate::JobHandler) while a job is executing.
pub struct CurrentJob {
    job: JobInfo,
    retry_count: u32,
    shutdown_rx: tokio::sync::broadcast::Receiver<()>,
}

impl CurrentJob {
    pub(crate) fn new(
        job: JobInfo,
        retry_count: u32,
        shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    ) -> Self {
        Self {
            job,
            retry_count,
            shutdown_rx,
        }
    }

    pub fn job(&self) -> &JobInfo {
        &self.job
    }

    pub fn tag(&self) -> Option<&JobTag> {
        self.job.tag()
    }

    /// Number of failed attempts before this one. `0` on the first run.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Deserialize the job's extras into your custom type.
    pub fn extras<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.job.extras()
    }

    /// Wait for a shutdown signal. Returns `true` if shutdown was requested.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use alarm_job::CurrentJob;
    /// # async fn example(mut current_job: CurrentJob) {
    /// tokio::select! {
    ///     _ = current_job.shutdown_requested() => {
    ///         return;
    ///     }
    ///     result = do_work() => {}
    /// }
    /// # }
    /// # async fn do_work() {}
    /// ```
    pub async fn shutdown_requested(&mut self) -> bool {
        self.shutdown_rx.recv().await.is_ok()
    }

    /// Non-blocking check if shutdown has been requested.
    pub fn is_shutdown_requested(&mut self) -> bool {
        self.shutdown_rx.try_recv().is_ok()
    }
}
