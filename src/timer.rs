//! In-process [`AlarmService`] backed by tokio timers.

use tokio::sync::mpsc;
use uuid::Uuid;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    alarm::{AlarmError, AlarmRequest, AlarmService},
    clock::ClockHandle,
    handle::OwnedTaskHandle,
    job_info::JobTag,
};

type PendingAlarms = Arc<Mutex<HashMap<Option<JobTag>, PendingAlarm>>>;

struct PendingAlarm {
    id: Uuid,
    handle: OwnedTaskHandle,
}

/// Keeps one timer task per tag and forwards the request on a channel once it fires.
///
/// Trigger times are converted into sleeps against the configured clock, so they
/// should come from the same clock.
pub struct TimerAlarmService {
    clock: ClockHandle,
    fired_tx: mpsc::UnboundedSender<AlarmRequest>,
    max_pending: Option<usize>,
    pending: PendingAlarms,
}

impl TimerAlarmService {
    pub fn new(
        clock: ClockHandle,
        fired_tx: mpsc::UnboundedSender<AlarmRequest>,
        max_pending: Option<usize>,
    ) -> Self {
        Self {
            clock,
            fired_tx,
            max_pending,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("Couldn't lock alarms Mutex").len()
    }

    /// Drop every pending alarm without firing it.
    pub fn cancel_all(&self) {
        let cancelled: Vec<_> = self
            .pending
            .lock()
            .expect("Couldn't lock alarms Mutex")
            .drain()
            .collect();
        if !cancelled.is_empty() {
            tracing::debug!(n_alarms = cancelled.len(), "cancelled pending alarms");
        }
    }
}

impl AlarmService for TimerAlarmService {
    fn register_trigger(&self, request: AlarmRequest) -> Result<(), AlarmError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AlarmError::Unavailable(e.to_string()))?;
        if self.fired_tx.is_closed() {
            return Err(AlarmError::Unavailable(
                "alarm receiver has been dropped".to_string(),
            ));
        }

        let mut pending = self.pending.lock().expect("Couldn't lock alarms Mutex");
        if let Some(max_pending) = self.max_pending
            && !pending.contains_key(&request.tag)
            && pending.len() >= max_pending
        {
            return Err(AlarmError::QuotaExceeded(pending.len()));
        }

        let id = Uuid::now_v7();
        let key = request.tag.clone();
        let remaining = request
            .trigger_at
            .saturating_duration_since(self.clock.now());
        let fired_tx = self.fired_tx.clone();
        let slots = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = OwnedTaskHandle::new(runtime.spawn(async move {
            tokio::time::sleep(remaining).await;
            let fired = {
                let mut slots = slots.lock().expect("Couldn't lock alarms Mutex");
                match slots.get(&task_key) {
                    Some(alarm) if alarm.id == id => slots.remove(&task_key),
                    _ => None,
                }
            };
            if let Some(alarm) = fired {
                alarm.handle.detach();
                tracing::debug!(alarm_id = %id, trigger_at = %request.trigger_at, "alarm fired");
                if fired_tx.send(request).is_err() {
                    tracing::warn!(alarm_id = %id, "alarm fired after receiver was dropped");
                }
            }
        }));

        if pending.insert(key, PendingAlarm { id, handle }).is_some() {
            tracing::debug!(alarm_id = %id, "superseded pending alarm");
        }
        Ok(())
    }
}
