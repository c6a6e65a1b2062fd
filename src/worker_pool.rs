//! Worker pool draining a [`BoundedWorkQueue`].
//!
//! Each worker loops over dequeue, batch gate, execute, complete. A failing or
//! panicking item only affects its own promise; the worker moves on to the next
//! item. Workers stop when the pool's cancellation token fires or the queue is
//! closed.

use crate::config::SettingsHandle;
use crate::error::{Error, Result};
use crate::queue::BoundedWorkQueue;
use crate::throttle::BatchThrottle;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Fixed-size set of workers sharing one queue and one batch throttle
pub struct WorkerPool<T> {
    queue: Arc<BoundedWorkQueue<T>>,
    settings: SettingsHandle,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            settings: self.settings.clone(),
        }
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool over `queue`; batch delays are read from `settings`
    pub fn new(queue: Arc<BoundedWorkQueue<T>>, settings: SettingsHandle) -> Self {
        Self { queue, settings }
    }

    /// Run `worker_count` workers until `cancel` fires or the queue closes
    ///
    /// Workers are paced in batches of `worker_count`. Returns once every
    /// worker has exited.
    pub async fn run(&self, worker_count: usize, cancel: CancellationToken) -> Result<()> {
        let throttle = Arc::new(BatchThrottle::new(
            worker_count,
            self.settings.clone(),
            cancel.clone(),
        )?);

        tracing::info!(
            workers = worker_count,
            batch_delay_ms = self.settings.current().batch_delay_ms,
            "Worker pool started"
        );

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(worker_loop(
                worker,
                Arc::clone(&self.queue),
                Arc::clone(&throttle),
                cancel.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task terminated abnormally");
            }
        }

        tracing::info!(batches = throttle.batches_armed(), "Worker pool stopped");
        Ok(())
    }

    /// Run the pool on a background task
    pub fn spawn(&self, worker_count: usize, cancel: CancellationToken) -> JoinHandle<Result<()>> {
        let pool = self.clone();
        tokio::spawn(async move { pool.run(worker_count, cancel).await })
    }
}

async fn worker_loop<T: Send + 'static>(
    worker: usize,
    queue: Arc<BoundedWorkQueue<T>>,
    throttle: Arc<BatchThrottle>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker, "Worker started");

    loop {
        let item = match queue.dequeue(&cancel).await {
            Ok(item) => item,
            Err(Error::Cancelled | Error::QueueClosed) => break,
            Err(e) => {
                tracing::error!(worker, error = %e, "Dequeue failed, stopping worker");
                break;
            }
        };
        let (operation, mut promise) = item.into_parts();

        if throttle.enter(&cancel).await.is_err() {
            // Claimed but never started; the producer sees a cancellation
            promise.try_set_cancelled();
            break;
        }

        let started = Instant::now();
        let token = cancel.child_token();
        let outcome = AssertUnwindSafe(async move { operation(token).await })
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                tracing::info!(worker, elapsed_ms, "Work item completed");
                promise.try_set_result(value);
            }
            Ok(Err(e)) if e.is_cancelled() => {
                tracing::info!(worker, elapsed_ms, "Work item cancelled");
                promise.try_set_error(e);
            }
            Ok(Err(e)) => {
                tracing::error!(worker, elapsed_ms, error = %e, "Work item failed");
                promise.try_set_error(e);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(worker, elapsed_ms, panic = %message, "Work item panicked");
                promise.try_set_error(Error::WorkerPanicked(message));
            }
        }
    }

    tracing::debug!(worker, "Worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
