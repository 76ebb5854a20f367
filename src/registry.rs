//! Registry mapping job tags to their handlers.

use std::{collections::HashMap, sync::Arc};

use super::{error::JobError, job_info::JobTag, runner::JobHandler};

/// Explicit handler map consulted when an alarm fires.
///
/// Jobs are routed by tag. Untagged jobs, or tags without a handler of their own,
/// go to the default handler if one is set.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<JobTag, Arc<dyn JobHandler>>,
    default_handler: Option<Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `tag`, replacing any previous one.
    pub fn add_handler<H: JobHandler>(&mut self, tag: impl Into<JobTag>, handler: H) {
        self.handlers.insert(tag.into(), Arc::new(handler));
    }

    pub fn set_default_handler<H: JobHandler>(&mut self, handler: H) {
        self.default_handler = Some(Arc::new(handler));
    }

    pub(crate) fn handler_for(&self, tag: Option<&JobTag>) -> Result<Arc<dyn JobHandler>, JobError> {
        tag.and_then(|tag| self.handlers.get(tag))
            .or(self.default_handler.as_ref())
            .cloned()
            .ok_or_else(|| JobError::NoHandlerRegistered(tag.cloned()))
    }

    /// Tags that have a dedicated handler.
    pub(crate) fn registered_tags(&self) -> Vec<JobTag> {
        self.handlers.keys().cloned().collect()
    }
}
