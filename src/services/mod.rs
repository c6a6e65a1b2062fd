//! Bulk download orchestration
//!
//! Each service reads its input list from CSV storage, submits one download
//! per symbol to the shared work queue, waits for every job, parses what came
//! back and writes the results to CSV files. Jobs that fail or return no data
//! are logged and left out; the summary reports how many symbols made it.
//! [`MarketDataFetchService`] reads the stored bar files back.

mod bars;
mod contract_ids;
mod fetch;

pub use bars::HistoricalBarDownloadService;
pub use contract_ids::ContractIdDownloadService;
pub use fetch::MarketDataFetchService;

use crate::downloader::{DownloadOutcome, SymbolDownloader};
use crate::error::Result;
use crate::queue::BoundedWorkQueue;
use futures::future::join_all;
use std::sync::Arc;

/// Work queue carrying download jobs
pub type DownloadQueue = BoundedWorkQueue<DownloadOutcome>;

/// One upstream request made on behalf of a symbol
#[derive(Clone, Debug)]
pub(crate) struct SymbolRequest {
    pub(crate) symbol: String,
    pub(crate) path: String,
}

/// Queue every request, then wait for all of them
///
/// Outcomes come back in request order. Jobs that failed are logged and
/// dropped. Fails only if the queue stops accepting work.
pub(crate) async fn download_all(
    queue: &DownloadQueue,
    downloader: &Arc<dyn SymbolDownloader>,
    requests: Vec<SymbolRequest>,
) -> Result<Vec<DownloadOutcome>> {
    let mut handles = Vec::with_capacity(requests.len());

    for SymbolRequest { symbol, path } in requests {
        let downloader = Arc::clone(downloader);
        let handle = queue
            .submit(move |token| async move {
                tracing::info!(symbol = %symbol, path = %path, "Starting queued download");
                downloader.download(&symbol, &path, &token).await
            })
            .await?;
        handles.push(handle);
    }

    tracing::info!(count = handles.len(), "All download jobs queued");

    let mut outcomes = Vec::with_capacity(handles.len());
    let mut failed = 0usize;
    for joined in join_all(handles).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failed += 1;
                tracing::error!(error = %e, "Download job failed");
            }
        }
    }

    if failed > 0 {
        tracing::warn!(
            failed,
            succeeded = outcomes.len(),
            "One or more downloads failed, continuing with available data"
        );
    }
    Ok(outcomes)
}
