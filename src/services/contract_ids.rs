use super::{DownloadQueue, SymbolRequest, download_all};
use crate::config::{FileStorageSettings, IbkrApiSettings};
use crate::downloader::{DownloadOutcome, SymbolDownloader};
use crate::error::Result;
use crate::storage::CsvFileStore;
use crate::types::{DownloadSummary, SymbolContract};
use serde_json::Value;
use std::sync::Arc;

/// Resolves each symbol to its current futures contract id
pub struct ContractIdDownloadService {
    queue: Arc<DownloadQueue>,
    downloader: Arc<dyn SymbolDownloader>,
    store: CsvFileStore,
    api: IbkrApiSettings,
    output_file: String,
}

impl ContractIdDownloadService {
    /// Create the service; results go to the configured symbols-and-contract-ids file
    pub fn new(
        queue: Arc<DownloadQueue>,
        downloader: Arc<dyn SymbolDownloader>,
        store: CsvFileStore,
        api: IbkrApiSettings,
        storage: &FileStorageSettings,
    ) -> Self {
        Self {
            queue,
            downloader,
            store,
            api,
            output_file: storage.symbols_and_contract_ids_file_name.clone(),
        }
    }

    /// Look up contract ids for every symbol in `input_file`
    pub async fn download_contract_ids(&self, input_file: &str) -> Result<DownloadSummary> {
        let symbols = self.store.read_symbols(input_file).await?;
        let requests = symbols
            .iter()
            .map(|symbol| SymbolRequest {
                symbol: symbol.clone(),
                path: self.search_path(symbol),
            })
            .collect();

        let outcomes = download_all(&self.queue, &self.downloader, requests).await?;
        let contracts: Vec<SymbolContract> = outcomes.iter().filter_map(parse_contract).collect();

        let retrieved = contracts.len();
        self.store.write_records(&self.output_file, contracts).await?;

        let message = format!(
            "Retrieved Contract Ids for {retrieved} of {} symbols",
            symbols.len()
        );
        tracing::info!(retrieved, requested = symbols.len(), "{message}");

        Ok(DownloadSummary {
            message,
            requested: symbols.len(),
            retrieved,
        })
    }

    fn search_path(&self, symbol: &str) -> String {
        format!(
            "{}?symbols={}&exchange={}",
            self.api.contract_search_endpoint,
            urlencoding::encode(symbol),
            urlencoding::encode(&self.api.exchange),
        )
    }
}

/// Pull `payload[symbol][0].conid`
fn parse_contract(outcome: &DownloadOutcome) -> Option<SymbolContract> {
    let symbol = outcome.symbol.as_str();
    tracing::info!(symbol, fields = outcome.payload.len(), "Received contract search result");

    if outcome.is_empty() {
        tracing::error!(symbol, "No contract data returned");
        return None;
    }

    let conid = outcome
        .payload
        .get(symbol)
        .and_then(|contracts| contracts.get(0))
        .and_then(|first| first.get("conid"));

    let contract_id = match conid {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };

    match contract_id {
        Some(contract_id) => Some(SymbolContract {
            name: symbol.to_string(),
            contract_id,
        }),
        None => {
            tracing::error!(symbol, "Contract search result has no usable conid");
            None
        }
    }
}
