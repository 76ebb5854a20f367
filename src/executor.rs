use tokio::{
    sync::{broadcast, mpsc},
    task::JoinSet,
};
use tracing::instrument;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use super::{
    alarm::AlarmRequest, dispatcher::JobDispatcher, handle::OwnedTaskHandle,
    registry::JobHandlerRegistry, scheduler::AlarmScheduler,
};

/// Receives fired alarms and runs each one on its own task.
pub(crate) struct JobExecutor {
    registry: Arc<JobHandlerRegistry>,
    scheduler: Arc<AlarmScheduler>,
    shutdown_timeout: Duration,
    instance_id: uuid::Uuid,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

pub(crate) struct JobExecutorHandle {
    handle: tokio::sync::Mutex<Option<OwnedTaskHandle>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    shutdown_called: Arc<AtomicBool>,
}

impl JobExecutor {
    pub fn new(
        registry: JobHandlerRegistry,
        scheduler: Arc<AlarmScheduler>,
        shutdown_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        Self {
            registry: Arc::new(registry),
            scheduler,
            shutdown_timeout,
            instance_id: uuid::Uuid::now_v7(),
            shutdown_tx,
        }
    }

    pub fn start(self, fired_rx: mpsc::UnboundedReceiver<AlarmRequest>) -> JobExecutorHandle {
        tracing::info!(
            executor_id = %self.instance_id,
            tags = ?self.registry.registered_tags(),
            "starting job executor"
        );
        let shutdown_tx = self.shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let handle = OwnedTaskHandle::new(tokio::task::spawn(
            self.main_loop(fired_rx, shutdown_rx),
        ));
        JobExecutorHandle {
            handle: tokio::sync::Mutex::new(Some(handle)),
            shutdown_tx,
            shutdown_called: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn main_loop(
        self,
        mut fired_rx: mpsc::UnboundedReceiver<AlarmRequest>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    break;
                }
                fired = fired_rx.recv() => match fired {
                    Some(fired) => self.dispatch_job(&mut running, fired),
                    None => break,
                },
                Some(_) = running.join_next(), if !running.is_empty() => {}
            }
        }

        self.drain(running).await;
    }

    fn dispatch_job(&self, running: &mut JoinSet<()>, fired: AlarmRequest) {
        let dispatcher = JobDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.scheduler),
            self.shutdown_tx.subscribe(),
            self.instance_id,
        );
        running.spawn(async move {
            let tag = fired.tag.clone();
            let retry_count = fired.retry_count;
            if let Err(e) = dispatcher.execute_job(fired).await {
                tracing::error!(job_tag = ?tag, retry_count, error = %e, "job dispatcher error");
            }
        });
    }

    #[instrument(name = "job.executor_drain", skip_all, fields(executor_id = %self.instance_id, n_jobs = running.len()))]
    async fn drain(&self, mut running: JoinSet<()>) {
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while running.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                n_jobs = running.len(),
                "aborting jobs still running after shutdown timeout"
            );
            running.shutdown().await;
        }
    }
}

impl JobExecutorHandle {
    /// Stop accepting fired alarms and wait for running jobs.
    ///
    /// Idempotent. Handlers see the signal through
    /// [`CurrentJob::shutdown_requested`](crate::CurrentJob::shutdown_requested).
    pub async fn shutdown(&self) {
        if self
            .shutdown_called
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.handle.lock().await.take() {
            handle.join().await;
        }
    }
}

impl Drop for JobExecutorHandle {
    fn drop(&mut self) {
        if !self.shutdown_called.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }
}
