//! Batch pacing for worker pools.
//!
//! Upstream gateways tend to limit bursts of concurrent requests rather than
//! sustained throughput. [`BatchThrottle`] lets `batch_size` callers through,
//! then holds everyone else until a timer releases the next batch.
//!
//! The throttle keeps one live [`BatchGate`]. Each [`enter`](BatchThrottle::enter)
//! bumps a counter and captures the current gate under the lock. The caller that
//! completes a batch swaps in a fresh, closed gate, resets the counter and arms a
//! timer that opens the new gate after the configured batch delay. Waiting on the
//! captured gate happens after the lock is released.

use crate::config::SettingsHandle;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

/// One-shot "this batch may proceed" signal
#[derive(Clone, Debug)]
struct BatchGate {
    released: Arc<watch::Sender<bool>>,
}

impl BatchGate {
    fn open() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self {
            released: Arc::new(tx),
        }
    }

    fn closed() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            released: Arc::new(tx),
        }
    }

    fn release(&self) {
        self.released.send_replace(true);
    }

    /// Resolves `true` once released, `false` if the gate can never open
    async fn wait(&self) -> bool {
        let mut rx = self.released.subscribe();
        rx.wait_for(|released| *released).await.is_ok()
    }
}

#[derive(Debug)]
struct BatchState {
    entered: usize,
    gate: BatchGate,
}

/// Shared pacing gate: `batch_size` entries, then a pause
#[derive(Debug)]
pub struct BatchThrottle {
    batch_size: usize,
    state: Mutex<BatchState>,
    settings: SettingsHandle,
    shutdown: CancellationToken,
    batches_armed: AtomicU64,
}

impl BatchThrottle {
    /// Create a throttle releasing `batch_size` callers per batch
    ///
    /// The pause between batches is read from `settings` each time a batch
    /// timer is armed. Cancelling `shutdown` stops pending timers.
    pub fn new(
        batch_size: usize,
        settings: SettingsHandle,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config(
                "max_parallel_workers",
                "batch size must be at least 1",
            ));
        }
        Ok(Self {
            batch_size,
            // The first batch goes through without delay
            state: Mutex::new(BatchState {
                entered: 0,
                gate: BatchGate::open(),
            }),
            settings,
            shutdown,
            batches_armed: AtomicU64::new(0),
        })
    }

    /// Number of batch timers armed so far
    pub fn batches_armed(&self) -> u64 {
        self.batches_armed.load(Ordering::Relaxed)
    }

    /// Wait until the caller's batch may proceed
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if `cancel` fires first, or if the gate can no
    /// longer be released.
    pub async fn enter(&self, cancel: &CancellationToken) -> Result<()> {
        let gate = {
            let mut state = self.state.lock().await;
            state.entered += 1;
            let current = state.gate.clone();

            if state.entered % self.batch_size == 0 {
                state.entered = 0;
                let next = BatchGate::closed();
                state.gate = next.clone();
                self.arm_release(next);
            }

            current
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            released = gate.wait() => {
                if released {
                    Ok(())
                } else {
                    Err(Error::Cancelled)
                }
            }
        }
    }

    fn arm_release(&self, gate: BatchGate) {
        let delay = self.settings.batch_delay();
        let shutdown = self.shutdown.clone();
        let batch = self.batches_armed.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::debug!(batch, delay_ms = delay.as_millis() as u64, "Batch complete, delaying next batch");

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(batch, "Batch delay cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    gate.release();
                }
            }
        });
    }
}
