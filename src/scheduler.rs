//! Turns job metadata into trigger times and hands them to the alarm port.

use tracing::{Span, instrument};

use std::{sync::Arc, time::Duration};

use crate::{
    alarm::{AlarmRequest, AlarmService},
    clock::ClockHandle,
    config::SchedulerConfig,
    error::SchedulerError,
    job_info::JobInfo,
};

/// Stateless scheduler computing trigger times and exponential retry backoff.
///
/// All pending state lives in the [`AlarmService`]. Calls for the same tag must be
/// serialized by the caller; the last registered request wins.
#[derive(Clone)]
pub struct AlarmScheduler {
    config: SchedulerConfig,
    alarms: Arc<dyn AlarmService>,
    clock: ClockHandle,
}

impl AlarmScheduler {
    pub fn new(config: SchedulerConfig, alarms: Arc<dyn AlarmService>, clock: ClockHandle) -> Self {
        Self {
            config,
            alarms,
            clock,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns `true` when the job must wait for an alarm rather than run right away.
    pub fn requires_scheduling(&self, job: &JobInfo) -> bool {
        !job.initial_delay().is_zero()
    }

    /// Request an alarm `initial_delay` from now.
    #[instrument(
        name = "alarm_scheduler.schedule",
        skip_all,
        fields(tag, delay_ms, trigger_at, retry_count = 0),
        err
    )]
    pub fn schedule(&self, job: &JobInfo) -> Result<(), SchedulerError> {
        self.register(job, job.initial_delay(), 0)
    }

    /// Request an alarm after the backoff for `retry_count` previous failures.
    ///
    /// The delay is `base_backoff * 2^retry_count`, bounded by `max_backoff` when set.
    #[instrument(
        name = "alarm_scheduler.reschedule",
        skip(self, job),
        fields(tag, delay_ms, trigger_at),
        err
    )]
    pub fn reschedule(&self, job: &JobInfo, retry_count: u32) -> Result<(), SchedulerError> {
        let delay = self.backoff_delay(retry_count)?;
        self.register(job, delay, retry_count.saturating_add(1))
    }

    /// Backoff applied after `retry_count` failed attempts.
    pub fn backoff_delay(&self, retry_count: u32) -> Result<Duration, SchedulerError> {
        if let Some(max_retries) = self.config.max_retries
            && retry_count >= max_retries
        {
            return Err(SchedulerError::RetryLimitReached {
                retry_count,
                max_retries,
            });
        }

        let doubled = 2u32
            .checked_pow(retry_count)
            .and_then(|factor| self.config.base_backoff.checked_mul(factor));
        match (doubled, self.config.max_backoff) {
            (Some(delay), Some(max_backoff)) => Ok(delay.min(max_backoff)),
            (Some(delay), None) => Ok(delay),
            (None, Some(max_backoff)) => Ok(max_backoff),
            (None, None) => Err(SchedulerError::BackoffOverflow { retry_count }),
        }
    }

    fn register(
        &self,
        job: &JobInfo,
        delay: Duration,
        retry_count: u32,
    ) -> Result<(), SchedulerError> {
        let span = Span::current();
        if let Some(tag) = job.tag() {
            span.record("tag", tracing::field::display(tag));
        }
        span.record("delay_ms", u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));

        let trigger_at = self
            .clock
            .now()
            .checked_add(delay)
            .ok_or(SchedulerError::TriggerTimeOverflow(delay))?;
        span.record("trigger_at", tracing::field::display(trigger_at));

        let request = AlarmRequest {
            trigger_at,
            tag: job.tag().cloned(),
            payload: job.to_bundle()?,
            retry_count,
        };
        self.alarms.register_trigger(request)?;
        Ok(())
    }
}
