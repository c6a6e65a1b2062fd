//! Service wiring and lifecycle
//!
//! [`MarketDataHub`] owns the process-wide work queue, the worker pool task,
//! the downloader, both orchestration services and the bar reader. It is created once, started
//! once and shut down once; the REST API and the config watcher only ever talk
//! to it through a shared `Arc`.

use crate::config::{Config, ConfigUpdate, DownloadServiceSettings, SettingsHandle};
use crate::downloader::{RetryingDownloader, SymbolDownloader};
use crate::error::{Error, Result};
use crate::services::{
    ContractIdDownloadService, DownloadQueue, HistoricalBarDownloadService, MarketDataFetchService,
};
use crate::storage::CsvFileStore;
use crate::types::{BarInterval, DownloadSummary, MarketDataResponse, QueueStats};
use crate::worker_pool::WorkerPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for workers to finish their current item
const POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

struct RunningPool {
    workers: usize,
    task: JoinHandle<Result<()>>,
}

/// Market-data download hub
pub struct MarketDataHub {
    config: Config,
    settings: SettingsHandle,
    queue: Arc<DownloadQueue>,
    contract_ids: ContractIdDownloadService,
    bars: HistoricalBarDownloadService,
    fetch: MarketDataFetchService,
    shutdown: CancellationToken,
    accepting: AtomicBool,
    pool: Mutex<Option<RunningPool>>,
}

impl MarketDataHub {
    /// Build a hub talking to the configured upstream API
    pub fn new(config: Config) -> Result<Self> {
        let downloader = RetryingDownloader::new(&config.ibkr, &config.retry)?;
        Self::with_downloader(config, Arc::new(downloader))
    }

    /// Build a hub around an existing downloader
    pub fn with_downloader(config: Config, downloader: Arc<dyn SymbolDownloader>) -> Result<Self> {
        config.download.validate()?;

        let settings = SettingsHandle::new(config.download.clone());
        let queue = Arc::new(DownloadQueue::new(config.download.max_queue_size)?);
        let store = CsvFileStore::from_settings(&config.storage);

        let contract_ids = ContractIdDownloadService::new(
            Arc::clone(&queue),
            Arc::clone(&downloader),
            store.clone(),
            config.ibkr.clone(),
            &config.storage,
        );
        let bars = HistoricalBarDownloadService::new(
            Arc::clone(&queue),
            downloader,
            store.clone(),
            config.ibkr.clone(),
            config.storage.clone(),
        );
        let fetch = MarketDataFetchService::new(store, config.storage.clone());

        Ok(Self {
            config,
            settings,
            queue,
            contract_ids,
            bars,
            fetch,
            shutdown: CancellationToken::new(),
            accepting: AtomicBool::new(true),
            pool: Mutex::new(None),
        })
    }

    /// Start the worker pool
    ///
    /// # Errors
    ///
    /// Fails if the pool is already running or the hub was shut down.
    pub async fn start(&self) -> Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            return Err(Error::Other("worker pool is already running".into()));
        }

        let workers = self.settings.current().max_parallel_workers;
        let task = WorkerPool::new(Arc::clone(&self.queue), self.settings.clone())
            .spawn(workers, self.shutdown.clone());
        *pool = Some(RunningPool { workers, task });

        tracing::info!(
            workers,
            queue_capacity = self.queue.capacity(),
            "Market-data hub started"
        );
        Ok(())
    }

    /// Stop accepting work, cancel the workers and wait for them to exit
    ///
    /// Items still waiting in the queue resolve as cancelled. Calling this
    /// more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        let drained = self.queue.close().await;
        if drained > 0 {
            tracing::info!(drained, "Cancelled queued downloads");
        }

        let running = self.pool.lock().await.take();
        if let Some(RunningPool { task, .. }) = running {
            match tokio::time::timeout(POOL_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => tracing::info!("Worker pool stopped"),
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Worker pool exited with error"),
                Ok(Err(e)) => {
                    return Err(Error::Other(format!("worker pool task failed: {e}")));
                }
                Err(_) => tracing::warn!("Timeout waiting for workers, proceeding with shutdown"),
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether the hub still accepts download requests
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Token cancelled when shutdown begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Configuration the hub was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve contract ids for every symbol in the configured symbols file
    pub async fn download_contract_ids(&self) -> Result<DownloadSummary> {
        self.ensure_accepting()?;
        self.contract_ids
            .download_contract_ids(&self.config.storage.symbols_file_name)
            .await
    }

    /// Download bars for every contract in the configured contract-id file
    pub async fn download_historical_bars(&self, interval: BarInterval) -> Result<DownloadSummary> {
        self.ensure_accepting()?;
        self.bars
            .download_historical_bars(
                interval,
                &self.config.storage.symbols_and_contract_ids_file_name,
            )
            .await
    }

    /// Download bars for the contracts left over from the last bar download
    pub async fn retry_historical_bars(&self, interval: BarInterval) -> Result<DownloadSummary> {
        self.ensure_accepting()?;
        self.bars
            .download_historical_bars(
                interval,
                &self.config.storage.retry_symbols_and_contract_ids_file_name,
            )
            .await
    }

    /// Bars previously stored for `symbol` at `interval`
    ///
    /// Reads only local files, so it keeps working during shutdown.
    pub async fn fetch_market_data(
        &self,
        symbol: &str,
        interval: BarInterval,
    ) -> Result<MarketDataResponse> {
        self.fetch.fetch_bars(symbol, interval).await
    }

    /// Queue and pool snapshot
    pub async fn queue_stats(&self) -> QueueStats {
        let settings = self.settings.current();
        let pool = self.pool.lock().await;
        let running = pool.as_ref().is_some_and(|p| !p.task.is_finished());

        QueueStats {
            capacity: self.queue.capacity(),
            pending: self.queue.pending(),
            free_slots: self.queue.available_slots(),
            workers: pool
                .as_ref()
                .map_or(settings.max_parallel_workers, |p| p.workers),
            batch_delay_ms: settings.batch_delay_ms,
            running,
        }
    }

    /// Current download settings
    pub fn settings(&self) -> DownloadServiceSettings {
        self.settings.current()
    }

    /// Shared settings handle (for hot reload)
    pub fn settings_handle(&self) -> SettingsHandle {
        self.settings.clone()
    }

    /// Apply a partial settings update
    ///
    /// The batch delay applies from the next batch on; worker count and queue
    /// size apply when a hub is next built and started.
    pub fn update_settings(&self, update: &ConfigUpdate) -> Result<DownloadServiceSettings> {
        self.settings.apply(update)
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
