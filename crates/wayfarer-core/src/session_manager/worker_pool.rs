//! Pipeline worker pool
//!
//! Bounds how many pipelines run at once. Submission never blocks the
//! caller: the task is spawned immediately and waits for a permit.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Fixed-size pool of pipeline slots
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool; `0` sizes it to the available parallelism
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = if size == 0 {
            std::thread::available_parallelism().map_or(4, |n| n.get())
        } else {
            size
        };

        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured number of slots
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently in use
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `task` once a slot is free
    pub fn submit<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!("Worker pool closed, dropping task");
                return;
            };
            debug!("Worker slot acquired");
            task.await;
        })
    }

    /// Refuse further work; queued tasks are dropped
    pub fn close(&self) {
        self.semaphore.close();
    }
}
