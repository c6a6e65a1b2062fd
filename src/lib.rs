//! # marketdata-hub
//!
//! Rate-limit aware bulk downloader for market-data symbols, futures contract
//! ids and historical bars.
//!
//! ## How it fits together
//!
//! - [`BoundedWorkQueue`] holds pending work and makes producers wait when it
//!   is full. Every submitted item gets a [`JobHandle`] that resolves with the
//!   item's result.
//! - [`WorkerPool`] drains the queue with a fixed number of workers, paced by
//!   a [`BatchThrottle`] that lets one batch run, then pauses before the next.
//! - [`RetryingDownloader`] calls the upstream REST API, retrying rate-limit
//!   and server errors with exponential backoff.
//! - The services read symbol lists from CSV files, fan out one download per
//!   symbol and write the results back as CSV. Stored bars can be read back
//!   with [`MarketDataFetchService`].
//! - [`MarketDataHub`] wires it all up and owns the lifecycle; the [`api`]
//!   module serves it over HTTP.
//!
//! ## Quick Start
//!
//! ```no_run
//! use marketdata_hub::{Config, MarketDataHub, run_with_shutdown};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let hub = Arc::new(MarketDataHub::new(config)?);
//!     hub.start().await?;
//!
//!     let summary = hub.download_contract_ids().await?;
//!     println!("{}", summary.message);
//!
//!     run_with_shutdown(hub).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Hot reload of download settings
pub mod config_watcher;
/// Upstream HTTP downloader
pub mod downloader;
/// Error types
pub mod error;
/// Service wiring and lifecycle
pub mod hub;
/// Bounded work queue with per-item result promises
pub mod queue;
/// Retry logic with exponential backoff
pub mod retry;
/// Bulk download orchestration
pub mod services;
/// CSV flat-file storage
pub mod storage;
/// Batch pacing for workers
pub mod throttle;
/// Core domain types
pub mod types;
/// Worker pool draining the queue
pub mod worker_pool;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{Config, ConfigUpdate, DownloadServiceSettings, SettingsHandle};
pub use config_watcher::ConfigWatcher;
pub use downloader::{DownloadOutcome, RetryingDownloader, SymbolDownloader};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use hub::MarketDataHub;
pub use queue::{BoundedWorkQueue, JobHandle};
pub use retry::RetryPolicy;
pub use services::{
    ContractIdDownloadService, HistoricalBarDownloadService, MarketDataFetchService,
};
pub use storage::{CsvFileStore, CsvRecord};
pub use throttle::BatchThrottle;
pub use types::{
    Bar, BarInterval, DownloadSummary, MarketDataResponse, QueueStats, SymbolContract,
};
pub use worker_pool::WorkerPool;

/// Run the hub until Ctrl+C or SIGTERM arrives, then shut it down.
///
/// Also returns once the hub is shut down by someone else. A signal that
/// cannot be registered is logged and never fires.
pub async fn run_with_shutdown(hub: std::sync::Arc<MarketDataHub>) -> Result<()> {
    let token = hub.shutdown_token();
    tokio::select! {
        _ = interrupted() => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminated() => tracing::info!("Received SIGTERM, shutting down"),
        _ = token.cancelled() => tracing::debug!("Hub shutdown already requested"),
    }
    hub.shutdown().await
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::FakeDownloader;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn run_with_shutdown_returns_once_the_hub_token_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.directory = dir.path().to_path_buf();

        let downloader = Arc::new(FakeDownloader::default());
        let hub = Arc::new(MarketDataHub::with_downloader(config, downloader).unwrap());
        hub.start().await.unwrap();

        let runner = tokio::spawn(run_with_shutdown(Arc::clone(&hub)));
        hub.shutdown_token().cancel();

        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("run_with_shutdown should return after cancellation")
            .unwrap()
            .unwrap();
        assert!(!hub.is_accepting());
        assert!(!hub.queue_stats().await.running);
    }
}
