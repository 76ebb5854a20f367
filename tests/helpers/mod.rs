#![allow(dead_code)]

use alarm_job::{AlarmError, AlarmRequest, AlarmService, JobTag};

use std::{collections::HashMap, sync::Mutex};

/// Alarm service that only records requests, replacing pending ones by tag.
#[derive(Default)]
pub struct RecordingAlarmService {
    pending: Mutex<HashMap<Option<JobTag>, AlarmRequest>>,
    registrations: Mutex<usize>,
    reject_with: Mutex<Option<AlarmError>>,
}

impl RecordingAlarmService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_with(&self, error: AlarmError) {
        *self.reject_with.lock().unwrap() = Some(error);
    }

    pub fn accept(&self) {
        *self.reject_with.lock().unwrap() = None;
    }

    pub fn pending(&self) -> Vec<AlarmRequest> {
        self.pending.lock().unwrap().values().cloned().collect()
    }

    pub fn pending_for(&self, tag: Option<&str>) -> Option<AlarmRequest> {
        self.pending
            .lock()
            .unwrap()
            .get(&tag.map(JobTag::from))
            .cloned()
    }

    pub fn registrations(&self) -> usize {
        *self.registrations.lock().unwrap()
    }
}

impl AlarmService for RecordingAlarmService {
    fn register_trigger(&self, request: AlarmRequest) -> Result<(), AlarmError> {
        if let Some(error) = self.reject_with.lock().unwrap().clone() {
            return Err(error);
        }
        *self.registrations.lock().unwrap() += 1;
        self.pending
            .lock()
            .unwrap()
            .insert(request.tag.clone(), request);
        Ok(())
    }
}
