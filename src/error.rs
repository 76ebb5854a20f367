//! Error types surfaced by the scheduler, the job descriptor and the executor.

use thiserror::Error;

use std::time::Duration;

use crate::{alarm::AlarmError, job_info::JobTag};

#[derive(Error, Debug)]
pub enum JobInfoError {
    #[error("JobInfoError - EmptyTag: a tag, when set, must not be empty")]
    EmptyTag,
    #[error("JobInfoError - MalformedBundle: {0}")]
    MalformedBundle(String),
    #[error("JobInfoError - Serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("JobInfoError - UninitializedField: {0}")]
    UninitializedField(#[from] derive_builder::UninitializedFieldError),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("SchedulerError - AlarmRejected: {0}")]
    AlarmRejected(#[from] AlarmError),
    #[error("SchedulerError - Payload: {0}")]
    Payload(#[from] JobInfoError),
    #[error("SchedulerError - BackoffOverflow: backoff for retry {retry_count} overflows")]
    BackoffOverflow { retry_count: u32 },
    #[error("SchedulerError - TriggerTimeOverflow: delay {0:?} cannot be added to the clock")]
    TriggerTimeOverflow(Duration),
    #[error("SchedulerError - RetryLimitReached: retry {retry_count} reached limit {max_retries}")]
    RetryLimitReached { retry_count: u32, max_retries: u32 },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("JobError - Scheduler: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("JobError - JobInfo: {0}")]
    JobInfo(#[from] JobInfoError),
    #[error("JobError - NoHandlerRegistered: {}", display_tag(.0))]
    NoHandlerRegistered(Option<JobTag>),
    #[error("JobError - JobExecutionError: {0}")]
    JobExecutionError(String),
    #[error("JobError - Config: {0}")]
    Config(String),
}

fn display_tag(tag: &Option<JobTag>) -> String {
    match tag {
        Some(tag) => tag.to_string(),
        None => "<untagged>".to_string(),
    }
}
