//! Monotonic time sources used to compute trigger times.

use serde::{Deserialize, Serialize};

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// A point on a monotonic clock, measured as the time elapsed since the clock's origin.
///
/// Trigger times never depend on wall-clock time, so time-zone changes or clock
/// adjustments leave scheduled alarms untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerTime(Duration);

impl TriggerTime {
    pub const fn from_elapsed(elapsed: Duration) -> Self {
        Self(elapsed)
    }

    pub const fn elapsed(&self) -> Duration {
        self.0
    }

    pub fn checked_add(&self, delay: Duration) -> Option<Self> {
        self.0.checked_add(delay).map(Self)
    }

    /// Time left from `earlier` until `self`, or zero when `self` is not later.
    pub fn saturating_duration_since(&self, earlier: TriggerTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0.as_millis())
    }
}

/// Source of monotonic time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> TriggerTime;
}

pub type ClockHandle = Arc<dyn Clock>;

/// Realtime monotonic clock.
///
/// Backed by [`tokio::time::Instant`], so tests running on a paused tokio runtime
/// observe the same virtual time the timers sleep on.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }

    pub fn handle() -> ClockHandle {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> TriggerTime {
        TriggerTime(self.origin.elapsed())
    }
}

/// Clock that only moves when advanced explicitly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(elapsed: Duration) -> Self {
        let clock = Self::new();
        clock.set(elapsed);
        clock
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .elapsed_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(by))
            });
    }

    pub fn set(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn handle(&self) -> ClockHandle {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TriggerTime {
        TriggerTime(Duration::from_nanos(
            self.elapsed_nanos.load(Ordering::SeqCst),
        ))
    }
}
