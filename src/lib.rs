//! `alarm-job` schedules deferred work on a monotonic clock and retries failed jobs
//! with exponentially increasing delay. The crate forbids `unsafe`.
//!
//! ## Core Concepts
//! - **Job descriptor** – [`JobInfo`] is an immutable value built with
//!   [`JobInfo::builder`], carrying an optional [`JobTag`], an initial delay and
//!   free-form extras. It crosses the alarm boundary as a [`JobBundle`].
//! - **Scheduler** – [`AlarmScheduler`] decides whether a job needs an alarm,
//!   computes trigger times and the retry backoff, and hands an [`AlarmRequest`] to
//!   an [`AlarmService`]. It keeps no state of its own.
//! - **Alarm port** – [`AlarmService`] is the collaborator that wakes the process.
//!   [`TimerAlarmService`] implements it in-process with tokio timers.
//! - **Handlers** – [`JobHandler`] implementations are registered per tag and
//!   receive a [`CurrentJob`] when their alarm fires.
//! - **Jobs service** – [`Jobs`] wires everything together.
//!
//! ## Backoff
//!
//! The `n`-th consecutive failure waits `base_backoff * 2^n` (10s, 20s, 40s, ...
//! with the default base). [`SchedulerConfig::max_backoff`] stops the growth and
//! [`SchedulerConfig::max_retries`] abandons the job; both are unset by default.
//!
//! ## Example
//!
//! ```no_run
//! use alarm_job::{CurrentJob, JobHandler, JobInfo, JobResult, Jobs, JobsConfig};
//! use async_trait::async_trait;
//! use std::time::Duration;
//!
//! struct Refresh;
//!
//! #[async_trait]
//! impl JobHandler for Refresh {
//!     async fn run(
//!         &self,
//!         current_job: CurrentJob,
//!     ) -> Result<JobResult, Box<dyn std::error::Error + Send + Sync>> {
//!         println!("attempt after {} failures", current_job.retry_count());
//!         Ok(JobResult::Complete)
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut jobs = Jobs::init(JobsConfig::builder().build()?);
//! jobs.add_handler("refresh", Refresh);
//! jobs.start().await?;
//!
//! let job = JobInfo::builder()
//!     .tag("refresh")
//!     .initial_delay(Duration::from_secs(30))
//!     .build()?;
//! jobs.schedule(&job)?;
//!
//! jobs.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]
#![forbid(unsafe_code)]

mod alarm;
mod clock;
mod config;
mod current;
mod dispatcher;
mod executor;
mod handle;
mod job_info;
mod registry;
mod runner;
mod scheduler;
mod timer;

pub mod error;

use tokio::sync::mpsc;
use tracing::instrument;

use std::sync::{Arc, Mutex};

pub use alarm::*;
pub use clock::*;
pub use config::*;
pub use current::*;
pub use job_info::*;
pub use registry::*;
pub use runner::*;
pub use scheduler::*;
pub use timer::*;

use error::*;
use executor::*;

/// Primary entry point. Registers handlers, schedules jobs and runs them when
/// their alarms fire.
pub struct Jobs {
    config: JobsConfig,
    scheduler: Arc<AlarmScheduler>,
    alarms: Arc<TimerAlarmService>,
    fired_tx: mpsc::UnboundedSender<AlarmRequest>,
    fired_rx: Mutex<Option<mpsc::UnboundedReceiver<AlarmRequest>>>,
    registry: Mutex<Option<JobHandlerRegistry>>,
    executor_handle: Option<JobExecutorHandle>,
}

impl Jobs {
    /// Build the service from a [`JobsConfig`]. Nothing runs until [`Jobs::start`].
    pub fn init(config: JobsConfig) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let alarms = Arc::new(TimerAlarmService::new(
            Arc::clone(&config.clock),
            fired_tx.clone(),
            config.max_pending_alarms,
        ));
        let scheduler = Arc::new(AlarmScheduler::new(
            config.scheduler_config.clone(),
            Arc::clone(&alarms) as Arc<dyn AlarmService>,
            Arc::clone(&config.clock),
        ));
        Self {
            config,
            scheduler,
            alarms,
            fired_tx,
            fired_rx: Mutex::new(Some(fired_rx)),
            registry: Mutex::new(Some(JobHandlerRegistry::new())),
            executor_handle: None,
        }
    }

    /// Register the handler that runs jobs tagged `tag`.
    ///
    /// # Panics
    ///
    /// Panics if called after [`start`](Self::start).
    pub fn add_handler<H: JobHandler>(&mut self, tag: impl Into<JobTag>, handler: H) {
        self.registry
            .lock()
            .expect("Couldn't lock Registry Mutex")
            .as_mut()
            .expect("Registry has been consumed by executor")
            .add_handler(tag, handler);
    }

    /// Register the handler for untagged jobs and for tags without a handler.
    ///
    /// # Panics
    ///
    /// Panics if called after [`start`](Self::start).
    pub fn set_default_handler<H: JobHandler>(&mut self, handler: H) {
        self.registry
            .lock()
            .expect("Couldn't lock Registry Mutex")
            .as_mut()
            .expect("Registry has been consumed by executor")
            .set_default_handler(handler);
    }

    /// Start the executor that runs fired jobs.
    ///
    /// Call this only after registering every handler.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Config`] if the executor has already been started.
    pub async fn start(&mut self) -> Result<(), JobError> {
        let fired_rx = self
            .fired_rx
            .lock()
            .expect("Couldn't lock receiver Mutex")
            .take()
            .ok_or_else(|| JobError::Config("executor already started".to_string()))?;
        let registry = self
            .registry
            .lock()
            .expect("Couldn't lock Registry Mutex")
            .take()
            .expect("Registry has been consumed by executor");
        let executor = JobExecutor::new(
            registry,
            Arc::clone(&self.scheduler),
            self.config.shutdown_timeout,
        );
        self.executor_handle = Some(executor.start(fired_rx));
        Ok(())
    }

    /// The scheduler shared by this service.
    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    /// Run `job` now if it has no delay, otherwise book an alarm for it.
    ///
    /// Scheduling a tagged job replaces any pending alarm with the same tag.
    #[instrument(name = "jobs.schedule", skip_all, fields(tag, deferred), err)]
    pub fn schedule(&self, job: &JobInfo) -> Result<(), JobError> {
        let span = tracing::Span::current();
        if let Some(tag) = job.tag() {
            span.record("tag", tracing::field::display(tag));
        }
        let deferred = self.scheduler.requires_scheduling(job);
        span.record("deferred", deferred);
        if deferred {
            self.scheduler.schedule(job)?;
        } else {
            let request = AlarmRequest {
                trigger_at: self.config.clock.now(),
                tag: job.tag().cloned(),
                payload: job.to_bundle()?,
                retry_count: 0,
            };
            self.fired_tx
                .send(request)
                .map_err(|_| AlarmError::Unavailable("job executor has stopped".to_string()))
                .map_err(SchedulerError::from)?;
        }
        Ok(())
    }

    /// Alarms booked and not yet fired.
    pub fn pending_alarm_count(&self) -> usize {
        self.alarms.pending_count()
    }

    /// Gracefully shut down: stop the executor, give running handlers
    /// `shutdown_timeout` to finish, and cancel pending alarms.
    ///
    /// This method is idempotent.
    #[instrument(name = "jobs.shutdown", skip(self), err)]
    pub async fn shutdown(&self) -> Result<(), JobError> {
        if let Some(handle) = &self.executor_handle {
            handle.shutdown().await;
        }
        self.alarms.cancel_all();
        Ok(())
    }
}
