use super::{DownloadQueue, SymbolRequest, download_all};
use crate::config::{FileStorageSettings, IbkrApiSettings};
use crate::downloader::{DownloadOutcome, SymbolDownloader};
use crate::error::Result;
use crate::storage::CsvFileStore;
use crate::types::{Bar, BarInterval, DownloadSummary, SymbolContract, ist_timestamp};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Downloads historical bars for a list of contracts
///
/// Bars for each symbol go to their own file under the configured path
/// template. Contracts that produced no bars are written to the retry file so
/// a later run can pick them up.
pub struct HistoricalBarDownloadService {
    queue: Arc<DownloadQueue>,
    downloader: Arc<dyn SymbolDownloader>,
    store: CsvFileStore,
    api: IbkrApiSettings,
    storage: FileStorageSettings,
}

impl HistoricalBarDownloadService {
    /// Create the service
    pub fn new(
        queue: Arc<DownloadQueue>,
        downloader: Arc<dyn SymbolDownloader>,
        store: CsvFileStore,
        api: IbkrApiSettings,
        storage: FileStorageSettings,
    ) -> Self {
        Self {
            queue,
            downloader,
            store,
            api,
            storage,
        }
    }

    /// Download `interval` bars for every contract in `input_file`
    pub async fn download_historical_bars(
        &self,
        interval: BarInterval,
        input_file: &str,
    ) -> Result<DownloadSummary> {
        let started = now_ist();
        let contracts = self.store.read_contracts(input_file).await?;

        let requests = contracts
            .iter()
            .map(|contract| SymbolRequest {
                symbol: contract.name.clone(),
                path: self.history_path(contract.contract_id, interval),
            })
            .collect();

        let outcomes = download_all(&self.queue, &self.downloader, requests).await?;

        let mut with_bars = HashSet::new();
        for outcome in &outcomes {
            let bars = parse_bars(interval, outcome);
            if bars.is_empty() {
                continue;
            }
            let file = self.storage.bars_path(interval.as_str(), &outcome.symbol);
            self.store.write_records(&file, bars).await?;
            with_bars.insert(outcome.symbol.clone());
        }

        let retry: Vec<SymbolContract> = contracts
            .iter()
            .filter(|contract| !with_bars.contains(&contract.name))
            .cloned()
            .collect();
        self.store
            .write_records(&self.storage.retry_symbols_and_contract_ids_file_name, retry)
            .await?;

        let retrieved = with_bars.len();
        let message = format!(
            "{started}: Retrieved Historical Bars of {interval} for {retrieved} of {} symbols",
            contracts.len()
        );
        tracing::info!(
            interval = %interval,
            started = %started,
            ended = %now_ist(),
            "Historical bar download finished"
        );

        Ok(DownloadSummary {
            message,
            requested: contracts.len(),
            retrieved,
        })
    }

    fn history_path(&self, contract_id: i64, interval: BarInterval) -> String {
        let (period, bar) = interval.history_query();
        let contract_id = contract_id.to_string();
        let query = [
            ("conid", contract_id.as_str()),
            ("exchange", self.api.exchange.as_str()),
            ("period", period),
            ("bar", bar),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

        format!("{}?{query}", self.api.historical_market_data_endpoint)
    }
}

fn now_ist() -> String {
    ist_timestamp(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Turn `payload.data[]` items `{t, o, h, l, c, v}` into bars
///
/// A single malformed item discards the whole response.
fn parse_bars(interval: BarInterval, outcome: &DownloadOutcome) -> Vec<Bar> {
    let symbol = outcome.symbol.as_str();
    tracing::info!(symbol, fields = outcome.payload.len(), "Received history result");

    if outcome.is_empty() {
        tracing::error!(symbol, "No history data returned");
        return Vec::new();
    }

    let Some(items) = outcome.payload.get("data").and_then(Value::as_array) else {
        tracing::error!(symbol, "History result has no data array");
        return Vec::new();
    };

    let parsed: Option<Vec<Bar>> = items
        .iter()
        .map(|item| parse_bar(symbol, interval, item))
        .collect();

    match parsed {
        Some(bars) if bars.is_empty() => {
            tracing::error!(symbol, "History result contains no bars");
            bars
        }
        Some(bars) => bars,
        None => {
            tracing::error!(symbol, "Malformed bar in history result");
            Vec::new()
        }
    }
}

fn parse_bar(symbol: &str, interval: BarInterval, item: &Value) -> Option<Bar> {
    Some(Bar {
        symbol: symbol.to_string(),
        interval,
        timestamp: ist_timestamp(item.get("t")?.as_i64()?)?,
        open: decimal(item.get("o")?)?,
        high: decimal(item.get("h")?)?,
        low: decimal(item.get("l")?)?,
        close: decimal(item.get("c")?)?,
        volume: volume(item.get("v")?)?,
    })
}

fn decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

fn volume(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        _ => None,
    }
}
