//! Configuration types for marketdata-hub

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use utoipa::ToSchema;

/// Worker pool and queue settings
///
/// All three values may be changed while the process runs. The batch delay is
/// read every time a batch timer is armed; worker count and queue size are read
/// when the pool and queue are built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadServiceSettings {
    /// Number of concurrent worker loops, also the batch size (default: 3)
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,

    /// Maximum number of queued, not yet claimed work items (default: 100)
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Pause between two batches of work, in milliseconds (default: 1000)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for DownloadServiceSettings {
    fn default() -> Self {
        Self {
            max_parallel_workers: default_max_parallel_workers(),
            max_queue_size: default_max_queue_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl DownloadServiceSettings {
    /// Batch delay as a [`Duration`]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Reject settings the worker pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_workers == 0 {
            return Err(Error::config(
                "max_parallel_workers",
                "at least one worker is required",
            ));
        }
        if self.max_queue_size == 0 {
            return Err(Error::config(
                "max_queue_size",
                "queue must hold at least one item",
            ));
        }
        Ok(())
    }
}

/// Retry configuration for upstream requests
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Total number of attempts per request, first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base unit of the exponential backoff in milliseconds (default: 1000)
    ///
    /// The wait after failed attempt `n` is `backoff_unit_ms * 2^n`.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            jitter: false,
        }
    }
}

/// Upstream REST API settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IbkrApiSettings {
    /// Base URL every request path is resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept header sent with every request
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Accept invalid TLS certificates (local gateway only)
    #[serde(default)]
    pub bypass_ssl: bool,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path of the futures contract search endpoint
    #[serde(default = "default_contract_search_endpoint")]
    pub contract_search_endpoint: String,

    /// Path of the historical market data endpoint
    #[serde(default = "default_historical_market_data_endpoint")]
    pub historical_market_data_endpoint: String,

    /// Exchange passed with every request (default: "NSE")
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

impl Default for IbkrApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            accept: default_accept(),
            bypass_ssl: false,
            request_timeout_secs: default_request_timeout_secs(),
            contract_search_endpoint: default_contract_search_endpoint(),
            historical_market_data_endpoint: default_historical_market_data_endpoint(),
            exchange: default_exchange(),
        }
    }
}

/// Flat-file locations
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FileStorageSettings {
    /// Root directory every file name is resolved against (default: "./data")
    #[serde(default = "default_storage_directory")]
    #[schema(value_type = String)]
    pub directory: PathBuf,

    /// Input list of symbols, one per row
    #[serde(default = "default_symbols_file_name")]
    pub symbols_file_name: String,

    /// Symbols with their current futures contract id
    #[serde(default = "default_symbols_and_contract_ids_file_name")]
    pub symbols_and_contract_ids_file_name: String,

    /// Symbols whose bars could not be downloaded on the last run
    #[serde(default = "default_retry_symbols_and_contract_ids_file_name")]
    pub retry_symbols_and_contract_ids_file_name: String,

    /// Relative path of a bar file; `{interval}` and `{symbol}` are substituted
    #[serde(default = "default_historical_bars_path_template")]
    pub historical_bars_path_template: String,
}

impl Default for FileStorageSettings {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
            symbols_file_name: default_symbols_file_name(),
            symbols_and_contract_ids_file_name: default_symbols_and_contract_ids_file_name(),
            retry_symbols_and_contract_ids_file_name:
                default_retry_symbols_and_contract_ids_file_name(),
            historical_bars_path_template: default_historical_bars_path_template(),
        }
    }
}

impl FileStorageSettings {
    /// Relative path of the bar file for one symbol and interval
    pub fn bars_path(&self, interval: &str, symbol: &str) -> String {
        self.historical_bars_path_template
            .replace("{interval}", interval)
            .replace("{symbol}", symbol)
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5080)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for the market-data hub
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Worker pool, queue and batch pacing
    #[serde(default)]
    pub download: DownloadServiceSettings,

    /// Upstream retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upstream API
    #[serde(default)]
    pub ibkr: IbkrApiSettings,

    /// Flat-file storage
    #[serde(default)]
    pub storage: FileStorageSettings,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: format!("invalid TOML: {e}"),
            key: None,
        })?;
        config.download.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML file, falling back to defaults when it is missing
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Runtime-changeable download settings
///
/// Partial update applied through [`SettingsHandle::apply`]; absent fields keep
/// their current value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ConfigUpdate {
    /// New worker count (takes effect on next start)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_workers: Option<usize>,

    /// New queue capacity (takes effect on next start)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_queue_size: Option<usize>,

    /// New batch delay in milliseconds (takes effect on the next batch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_delay_ms: Option<u64>,
}

/// Shared, hot-reloadable view of [`DownloadServiceSettings`]
///
/// Cloning is cheap; every clone observes the same current value.
#[derive(Clone, Debug)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<DownloadServiceSettings>>,
}

impl SettingsHandle {
    /// Create a handle holding `settings`
    pub fn new(settings: DownloadServiceSettings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current settings
    pub fn current(&self) -> DownloadServiceSettings {
        self.tx.borrow().clone()
    }

    /// Current batch delay
    pub fn batch_delay(&self) -> Duration {
        self.tx.borrow().batch_delay()
    }

    /// Replace the settings after validating them
    pub fn replace(&self, settings: DownloadServiceSettings) -> Result<()> {
        self.modify(|current| *current = settings).map(|_| ())
    }

    /// Apply a partial update and return the resulting settings
    ///
    /// The merge runs under the channel lock, so concurrent updates to
    /// different fields all survive.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<DownloadServiceSettings> {
        self.modify(|next| {
            if let Some(workers) = update.max_parallel_workers {
                next.max_parallel_workers = workers;
            }
            if let Some(size) = update.max_queue_size {
                next.max_queue_size = size;
            }
            if let Some(delay) = update.batch_delay_ms {
                next.batch_delay_ms = delay;
            }
        })
    }

    /// Edit a copy of the current value, then store it if it validates
    fn modify(
        &self,
        edit: impl FnOnce(&mut DownloadServiceSettings),
    ) -> Result<DownloadServiceSettings> {
        let mut outcome = Ok(());
        let mut result = None;

        self.tx.send_if_modified(|current| {
            let mut next = current.clone();
            edit(&mut next);
            if let Err(e) = next.validate() {
                outcome = Err(e);
                return false;
            }

            let changed = next != *current;
            if changed {
                tracing::info!(
                    max_parallel_workers = next.max_parallel_workers,
                    max_queue_size = next.max_queue_size,
                    batch_delay_ms = next.batch_delay_ms,
                    "Download settings changed"
                );
                *current = next.clone();
            }
            result = Some(next);
            changed
        });

        outcome?;
        Ok(result.unwrap_or_else(|| self.current()))
    }

    /// Subscribe to settings changes
    pub fn subscribe(&self) -> watch::Receiver<DownloadServiceSettings> {
        self.tx.subscribe()
    }
}

fn default_max_parallel_workers() -> usize {
    3
}

fn default_max_queue_size() -> usize {
    100
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_base_url() -> String {
    "https://localhost:5000/".to_string()
}

fn default_user_agent() -> String {
    "MyApp/1.0".to_string()
}

fn default_accept() -> String {
    "application/json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_contract_search_endpoint() -> String {
    "v1/api/trsrv/futures".to_string()
}

fn default_historical_market_data_endpoint() -> String {
    "v1/api/iserver/marketdata/history".to_string()
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from("./data")
}

fn default_symbols_file_name() -> String {
    "symbols.csv".to_string()
}

fn default_symbols_and_contract_ids_file_name() -> String {
    "symbols_contract_ids.csv".to_string()
}

fn default_retry_symbols_and_contract_ids_file_name() -> String {
    "retry_symbols_contract_ids.csv".to_string()
}

fn default_historical_bars_path_template() -> String {
    "bars/{interval}/{symbol}.csv".to_string()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}
