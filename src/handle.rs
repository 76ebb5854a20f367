use tokio::task::JoinHandle;

/// Join handle that aborts its task when dropped.
pub(crate) struct OwnedTaskHandle(Option<JoinHandle<()>>);

impl OwnedTaskHandle {
    pub fn new(inner: JoinHandle<()>) -> Self {
        Self(Some(inner))
    }

    /// Wait for the task to end on its own.
    pub async fn join(self) {
        let _ = self.into_inner().await;
    }

    /// Let the task run to completion without holding on to it.
    pub fn detach(self) {
        drop(self.into_inner());
    }

    fn into_inner(mut self) -> JoinHandle<()> {
        self.0.take().expect("Only consumed once")
    }
}

impl Drop for OwnedTaskHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
