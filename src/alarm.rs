//! Port to the facility that wakes the process at a trigger time.

use thiserror::Error;

use crate::{
    clock::TriggerTime,
    job_info::{JobBundle, JobTag},
};

/// One-shot wakeup request handed to an [`AlarmService`].
#[derive(Clone, Debug, PartialEq)]
pub struct AlarmRequest {
    /// Monotonic time at which the alarm should fire.
    pub trigger_at: TriggerTime,
    /// Label of the request. A later request with the same label supersedes this one.
    pub tag: Option<JobTag>,
    /// Serialized job carried back to the executor when the alarm fires.
    pub payload: JobBundle,
    /// Failed attempts that preceded the execution this alarm triggers.
    pub retry_count: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("AlarmError - QuotaExceeded: {0} pending alarms")]
    QuotaExceeded(usize),
    #[error("AlarmError - PermissionDenied")]
    PermissionDenied,
    #[error("AlarmError - Unavailable: {0}")]
    Unavailable(String),
}

/// Registers one-shot alarms.
///
/// Implementations must keep at most one pending request per tag: registering a
/// request whose tag matches a pending one replaces it. Untagged requests share a
/// single slot.
pub trait AlarmService: Send + Sync + 'static {
    fn register_trigger(&self, request: AlarmRequest) -> Result<(), AlarmError>;
}
