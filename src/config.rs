//! Scheduler and service configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::clock::{ClockHandle, SystemClock};

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Controls the exponential backoff applied by [`AlarmScheduler::reschedule`](crate::AlarmScheduler::reschedule).
pub struct SchedulerConfig {
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[serde(default = "default_base_backoff")]
    /// Delay of the first retry. Every further retry doubles it.
    pub base_backoff: Duration,
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    #[serde(default)]
    /// Once the doubling reaches this value it stops growing. `None` leaves it unbounded.
    pub max_backoff: Option<Duration>,
    #[serde(default)]
    /// Retry count at which rescheduling is refused. `None` retries indefinitely.
    pub max_retries: Option<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_backoff: default_base_backoff(),
            max_backoff: None,
            max_retries: None,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_backoff.is_zero() {
            return Err("base_backoff must be greater than zero".to_string());
        }
        if let Some(max_backoff) = self.max_backoff
            && max_backoff < self.base_backoff
        {
            return Err("max_backoff must not be smaller than base_backoff".to_string());
        }
        Ok(())
    }
}

#[derive(Builder, Clone)]
#[builder(build_fn(skip))]
/// Configuration consumed by [`Jobs::init`](crate::Jobs::init).
/// Build with [`JobsConfig::builder`](Self::builder).
///
/// ```rust
/// use alarm_job::{JobsConfig, SchedulerConfig};
/// use std::time::Duration;
///
/// let config = JobsConfig::builder()
///     .scheduler_config(SchedulerConfig {
///         max_retries: Some(5),
///         ..Default::default()
///     })
///     .shutdown_timeout(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// ```
pub struct JobsConfig {
    #[builder(default)]
    /// Backoff settings shared by every job.
    pub scheduler_config: SchedulerConfig,
    #[builder(setter(into), default = "SystemClock::handle()")]
    /// Monotonic clock used for trigger times. Defaults to [`SystemClock`].
    pub clock: ClockHandle,
    #[builder(default = "default_shutdown_timeout()")]
    /// How long running handlers may take to finish once shutdown starts.
    pub shutdown_timeout: Duration,
    #[builder(setter(into, strip_option), default)]
    /// Upper bound on distinct pending alarms. `None` means no quota.
    pub max_pending_alarms: Option<usize>,
}

impl JobsConfig {
    pub fn builder() -> JobsConfigBuilder {
        JobsConfigBuilder::default()
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            scheduler_config: SchedulerConfig::default(),
            clock: SystemClock::handle(),
            shutdown_timeout: default_shutdown_timeout(),
            max_pending_alarms: None,
        }
    }
}

impl std::fmt::Debug for JobsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobsConfig")
            .field("scheduler_config", &self.scheduler_config)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("max_pending_alarms", &self.max_pending_alarms)
            .finish_non_exhaustive()
    }
}

impl JobsConfigBuilder {
    /// Validate and construct a [`JobsConfig`].
    pub fn build(&mut self) -> Result<JobsConfig, String> {
        let scheduler_config = self.scheduler_config.clone().unwrap_or_default();
        scheduler_config.validate()?;

        let max_pending_alarms = self.max_pending_alarms.flatten();
        if max_pending_alarms == Some(0) {
            return Err("max_pending_alarms must be greater than zero".to_string());
        }

        Ok(JobsConfig {
            scheduler_config,
            clock: self.clock.clone().unwrap_or_else(SystemClock::handle),
            shutdown_timeout: self.shutdown_timeout.unwrap_or_else(default_shutdown_timeout),
            max_pending_alarms,
        })
    }
}

fn default_base_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.base_backoff, Duration::from_secs(10));
        assert!(config.max_backoff.is_none());
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn durations_are_read_as_millis() {
        let config: SchedulerConfig = serde_json::from_str(
            r#"{"base_backoff": 500, "max_backoff": 60000, "max_retries": 4}"#,
        )
        .unwrap();
        assert_eq!(config.base_backoff, Duration::from_millis(500));
        assert_eq!(config.max_backoff, Some(Duration::from_secs(60)));
        assert_eq!(config.max_retries, Some(4));
    }

    #[test]
    fn builder_rejects_invalid_backoff() {
        let err = JobsConfig::builder()
            .scheduler_config(SchedulerConfig {
                base_backoff: Duration::ZERO,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.contains("base_backoff"));

        let err = JobsConfig::builder()
            .scheduler_config(SchedulerConfig {
                max_backoff: Some(Duration::from_secs(1)),
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.contains("max_backoff"));
    }

    #[test]
    fn builder_rejects_zero_quota() {
        assert!(JobsConfig::builder().max_pending_alarms(0usize).build().is_err());
    }

    #[test]
    fn builder_fills_defaults() {
        let config = JobsConfig::builder().build().unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.max_pending_alarms.is_none());
    }
}
