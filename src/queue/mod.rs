//! Bounded FIFO work queue with backpressure.
//!
//! Producers [`submit`](BoundedWorkQueue::submit) closures and get back a
//! [`JobHandle`]; workers [`dequeue`](BoundedWorkQueue::dequeue) them together
//! with the [`ResultPromise`] they must complete.
//!
//! Two counting semaphores drive the queue:
//! - `slots` holds one permit per free queue position. A producer takes one
//!   before pushing and it is handed back when a worker *claims* the item, not
//!   when the item finishes. The bound therefore limits unclaimed work only.
//! - `ready` holds one permit per item that has been pushed but not claimed.
//!
//! ```no_run
//! use marketdata_hub::queue::BoundedWorkQueue;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> marketdata_hub::Result<()> {
//! let queue = BoundedWorkQueue::<String>::new(100)?;
//! let handle = queue.submit(|_token| async { Ok("done".to_string()) }).await?;
//!
//! // elsewhere, a worker:
//! let item = queue.dequeue(&CancellationToken::new()).await?;
//! let (operation, mut promise) = item.into_parts();
//! let value = operation(CancellationToken::new()).await;
//! promise.try_complete(value);
//!
//! assert_eq!(handle.await?, "done");
//! # Ok(())
//! # }
//! ```

pub mod promise;

pub use promise::{JobHandle, ResultPromise};

use crate::error::{Error, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// Future returned by a work operation
pub type WorkFuture<T> = BoxFuture<'static, Result<T>>;

/// Type-erased work operation; receives the executing worker's cancellation token
pub type WorkOperation<T> = Box<dyn FnOnce(CancellationToken) -> WorkFuture<T> + Send + 'static>;

/// One queued unit of work and the promise its result goes to
pub struct WorkItem<T> {
    operation: WorkOperation<T>,
    promise: ResultPromise<T>,
}

impl<T> WorkItem<T> {
    /// Split into the operation to run and the promise to complete
    pub fn into_parts(self) -> (WorkOperation<T>, ResultPromise<T>) {
        (self.operation, self.promise)
    }
}

impl<T> std::fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("completed", &self.promise.is_completed())
            .finish_non_exhaustive()
    }
}

/// Capacity-limited FIFO of pending work items
pub struct BoundedWorkQueue<T> {
    items: Mutex<VecDeque<WorkItem<T>>>,
    slots: Semaphore,
    ready: Semaphore,
    capacity: usize,
    closed: AtomicBool,
}

impl<T: Send + 'static> BoundedWorkQueue<T> {
    /// Create a queue holding at most `capacity` unclaimed items
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config(
                "max_queue_size",
                "queue must hold at least one item",
            ));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
            closed: AtomicBool::new(false),
        })
    }

    /// Queue `operation`, waiting for a free slot if the queue is full
    ///
    /// Returns as soon as the item is queued; await the returned handle for
    /// the result.
    ///
    /// # Errors
    ///
    /// [`Error::QueueClosed`] if the queue is closed before a slot frees up.
    pub async fn submit<F, Fut>(&self, operation: F) -> Result<JobHandle<T>>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.submit_cancellable(operation, &CancellationToken::new())
            .await
    }

    /// Like [`submit`](Self::submit), but gives up with [`Error::Cancelled`]
    /// when `cancel` fires while waiting for a slot
    pub async fn submit_cancellable<F, Fut>(
        &self,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<JobHandle<T>>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(Error::QueueClosed);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.slots.acquire() => permit.map_err(|_| Error::QueueClosed)?,
        };

        let (promise, handle) = promise::channel();
        let item = WorkItem {
            operation: Box::new(move |token| operation(token).boxed()),
            promise,
        };

        {
            let mut items = self.items.lock().await;
            if self.is_closed() {
                // permit drops here and returns the slot
                return Err(Error::QueueClosed);
            }
            items.push_back(item);
            // The slot now belongs to the queued item until it is claimed.
            permit.forget();
        }
        self.ready.add_permits(1);

        tracing::debug!(pending = self.pending(), "Work item queued");
        Ok(handle)
    }

    /// Queue `operation` and wait for its result
    pub async fn execute<F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.submit(operation).await?.await
    }

    /// Claim the oldest queued item, waiting until one exists
    ///
    /// The item's queue slot is released immediately, before it runs.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires first (immediately if it already has)
    /// - [`Error::QueueClosed`] if the queue is closed
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<WorkItem<T>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.ready.acquire() => permit.map_err(|_| Error::QueueClosed)?,
        };

        let item = {
            let mut items = self.items.lock().await;
            let item = items.pop_front();
            if item.is_some() {
                permit.forget();
            }
            item
        };

        match item {
            Some(item) => {
                self.slots.add_permits(1);
                Ok(item)
            }
            // Only reachable when close() drained the items under us
            None => Err(Error::QueueClosed),
        }
    }

    /// Close the queue
    ///
    /// Blocked producers and workers wake up with [`Error::QueueClosed`];
    /// items still waiting in the queue resolve as cancelled. Returns the number
    /// of items that were drained. Closing twice is a no-op.
    pub async fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        self.slots.close();
        self.ready.close();

        let drained: Vec<WorkItem<T>> = self.items.lock().await.drain(..).collect();
        let count = drained.len();
        for item in drained {
            let (_operation, mut promise) = item.into_parts();
            promise.try_set_cancelled();
        }

        tracing::info!(drained = count, "Work queue closed");
        count
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Maximum number of unclaimed items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued, not yet claimed items
    pub fn pending(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.ready.available_permits()
    }

    /// Number of free queue positions
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}
