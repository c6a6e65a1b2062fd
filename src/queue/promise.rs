//! Single-assignment result slot paired with every queued work item.
//!
//! A [`ResultPromise`] is held by whoever executes the item; the matching
//! [`JobHandle`] is held by the producer and resolves once the promise is
//! completed. Completion is first-wins: later attempts are ignored.

use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Write side of a job result
#[derive(Debug)]
pub struct ResultPromise<T> {
    tx: Option<oneshot::Sender<Result<T>>>,
}

/// Read side of a job result
///
/// Resolves to the worker's value, the worker's error, or [`Error::Cancelled`]
/// when the item was dropped or cancelled before it produced anything.
#[derive(Debug)]
#[must_use = "a job handle does nothing unless awaited"]
pub struct JobHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

/// Create a connected promise/handle pair
pub fn channel<T>() -> (ResultPromise<T>, JobHandle<T>) {
    let (tx, rx) = oneshot::channel();
    (ResultPromise { tx: Some(tx) }, JobHandle { rx })
}

impl<T> ResultPromise<T> {
    /// Complete with `outcome`
    ///
    /// Returns `false` if the promise was already completed. A producer that
    /// stopped listening does not make this fail.
    pub fn try_complete(&mut self, outcome: Result<T>) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // Receiver gone means nobody is waiting; the slot is still spent.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Complete with a value
    pub fn try_set_result(&mut self, value: T) -> bool {
        self.try_complete(Ok(value))
    }

    /// Complete with a failure
    pub fn try_set_error(&mut self, error: Error) -> bool {
        self.try_complete(Err(error))
    }

    /// Complete as cancelled
    pub fn try_set_cancelled(&mut self) -> bool {
        self.try_complete(Err(Error::Cancelled))
    }

    /// Whether a completion has already been recorded
    pub fn is_completed(&self) -> bool {
        self.tx.is_none()
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Promise dropped without completion
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
