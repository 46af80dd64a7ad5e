//! Worker Pool Implementation
//!
//! Spawns the workers that drain the `Queue`.
//!
//! ## Responsibilities
//! - **Polling**: Each idle worker looks for a claimable item every poll interval.
//! - **Lease Management**: A side task renews the item's lease while its action runs.
//! - **Execution**: Dispatching to the action handler and recording the outcome.
//! - **Shutdown**: Workers finish their current item and exit when told to stop.

use super::actions;
use super::queue::Queue;
use super::types::*;
use crate::context::Context;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct QueueExecutor {
    queue: Arc<Queue>,
    context: Arc<Context>,
    worker_count: usize,
    poll_interval: Duration,
    lease: Duration,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueExecutor {
    pub fn new(queue: Arc<Queue>, context: Arc<Context>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            worker_count: context.config.worker_count,
            poll_interval: context.config.poll_interval,
            lease: context.config.lease,
            queue,
            context,
            shutdown,
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the workers and returns immediately.
    pub fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock();
        for worker_id in 0..self.worker_count {
            let executor = self.clone();
            let shutdown = self.shutdown.subscribe();
            workers.push(tokio::spawn(async move {
                executor.worker_loop(worker_id, shutdown).await;
            }));
        }

        tracing::info!("Queue executor started with {} workers", self.worker_count);
    }

    /// Stops the workers and waits for them to finish their current item.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("Queue worker ended abnormally: {}", e);
            }
        }
        tracing::info!("Queue executor stopped");
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!("Worker {} started", worker_id);

        while !*shutdown.borrow() {
            match self.queue.claim_next() {
                Ok(Some(item)) => {
                    tracing::info!(
                        "Worker {} claimed item {} ({})",
                        worker_id,
                        item.id,
                        item.action
                    );
                    self.execute_with_lease(item).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Worker {} failed to claim an item: {}", worker_id, e),
            }

            // Idle: wait for the next poll or for shutdown.
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        tracing::debug!("Worker {} stopped", worker_id);
    }

    async fn execute_with_lease(&self, item: QueueItem) {
        let renewal = self.spawn_lease_renewal(&item.id);

        let outcome = actions::execute(&self.context, &item).await;

        renewal.abort();

        if let Err(e) = self.queue.complete(&item.id, outcome) {
            tracing::error!("Failed to record outcome of item {}: {}", item.id, e);
        }
    }

    /// Renews the lease at a third of its length until aborted or the item
    /// is no longer in progress.
    fn spawn_lease_renewal(&self, id: &QueueItemId) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let id = id.clone();
        let every = (self.lease / 3).max(Duration::from_millis(10));

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;

                if let Err(e) = queue.renew_lease(&id) {
                    tracing::trace!("Item {} no longer needs lease renewal: {}", id, e);
                    break;
                }
            }
        })
    }
}
