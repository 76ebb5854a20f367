//! Traits and types used when defining job logic.

use async_trait::async_trait;

use super::current::CurrentJob;

/// Outcome returned by [`JobHandler::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// Job finished; nothing else is scheduled.
    Complete,
    /// Job could not finish; reschedule it after the backoff for its retry count.
    Retry,
}

#[async_trait]
/// Implemented by the code that performs a job once its alarm fires.
///
/// Returning an error (or panicking) is treated like [`JobResult::Retry`].
pub trait JobHandler: Send + Sync + 'static {
    async fn run(
        &self,
        current_job: CurrentJob,
    ) -> Result<JobResult, Box<dyn std::error::Error + Send + Sync>>;
}
