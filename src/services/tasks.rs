//! Background Task Pool
//!
//! Bounded pool for analysis work (correlation, impact updates). Tasks are
//! spawned immediately but wait for a pool slot before running, so the
//! request-handling and watcher paths never block on analysis. A panicking
//! task is contained by its own tokio task.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct TaskPool {
    slots: Arc<Semaphore>,
}

impl TaskPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Schedule a background task. Returns immediately.
    pub fn spawn<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return, // pool shut down
            };
            tracing::debug!(task = label, "background task started");
            future.await;
            tracing::debug!(task = label, "background task finished");
        });
    }

    /// Slots currently free (test/diagnostic use).
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
