//! marketdata-hub server: loads configuration, starts the worker pool and
//! serves the REST API until SIGINT/SIGTERM.

use clap::Parser;
use marketdata_hub::{Config, ConfigWatcher, MarketDataHub, api, run_with_shutdown};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marketdata-hub",
    version,
    about = "Rate-limit aware bulk downloader for market-data symbols, contracts and bars"
)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when it does not exist.
    #[arg(long, default_value = "marketdata-hub.toml")]
    config: PathBuf,

    /// Reload download settings whenever the config file changes.
    #[arg(long, default_value_t = false)]
    watch_config: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> marketdata_hub::Result<()> {
    let config = Config::load_or_default(&cli.config).await?;
    let api_config = config.api.clone();

    let hub = Arc::new(MarketDataHub::new(config)?);
    hub.start().await?;

    if cli.watch_config {
        let mut watcher = ConfigWatcher::new(&cli.config, hub.settings_handle())?;
        watcher.start()?;
        tokio::spawn(watcher.run(hub.shutdown_token()));
    }

    let mut server = tokio::spawn(api::start_api_server(Arc::clone(&hub), api_config));

    tokio::select! {
        result = run_with_shutdown(Arc::clone(&hub)) => result?,
        // Server exited on its own (e.g. bind failure): stop the workers too
        joined = &mut server => {
            hub.shutdown().await?;
            return server_result(joined);
        }
    }

    server_result(server.await)
}

fn server_result(
    joined: Result<marketdata_hub::Result<()>, tokio::task::JoinError>,
) -> marketdata_hub::Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(marketdata_hub::Error::ApiServerError(e.to_string())),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("marketdata-hub failed: {}", e);
        std::process::exit(1);
    }
}
