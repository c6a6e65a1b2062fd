use crate::config::FileStorageSettings;
use crate::error::{Error, Result};
use crate::storage::CsvFileStore;
use crate::types::{Bar, BarInterval, MarketDataResponse};

/// Reads stored bars back out of the per-symbol bar files
pub struct MarketDataFetchService {
    store: CsvFileStore,
    storage: FileStorageSettings,
}

impl MarketDataFetchService {
    /// Create the service
    pub fn new(store: CsvFileStore, storage: FileStorageSettings) -> Self {
        Self { store, storage }
    }

    /// Bars stored for `symbol` at `interval`
    ///
    /// A file that is missing or cannot be parsed yields no bars; only a
    /// symbol that cannot name a file is an error.
    pub async fn fetch_bars(
        &self,
        symbol: &str,
        interval: BarInterval,
    ) -> Result<MarketDataResponse> {
        let symbol = symbol.trim();
        validate_symbol(symbol)?;

        let file = self.storage.bars_path(interval.as_str(), symbol);
        let bars = self.read_or_empty(&file).await;
        tracing::info!(
            symbol,
            interval = %interval,
            file = %file,
            count = bars.len(),
            "Fetched stored bars"
        );

        Ok(MarketDataResponse {
            message: format!(
                "Fetched {} records for {interval} interval of {symbol}",
                bars.len()
            ),
            bars,
        })
    }

    async fn read_or_empty(&self, file: &str) -> Vec<Bar> {
        match self.store.read_bars(file).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::error!(file, error = %e, "Failed to read stored bars");
                Vec::new()
            }
        }
    }
}

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(Error::Validation("symbol must not be blank".into()));
    }
    if symbol.contains(['/', '\\']) || symbol.contains("..") {
        return Err(Error::Validation(format!(
            "symbol '{symbol}' must not contain path separators"
        )));
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &tempfile::TempDir) -> MarketDataFetchService {
        let storage = FileStorageSettings {
            directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        MarketDataFetchService::new(CsvFileStore::from_settings(&storage), storage)
    }

    #[tokio::test]
    async fn reads_bars_from_the_templated_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bars/15m")).unwrap();
        std::fs::write(
            dir.path().join("bars/15m/TCS.csv"),
            "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume\n\
             TCS,15m,2024-01-02 09:15:00,3800,3812.5,3795,3810,4500\n\
             TCS,15m,2024-01-02 09:30:00,3810,3820,3805.05,3818,3900\n",
        )
        .unwrap();

        let response = service(&dir)
            .fetch_bars(" TCS ", BarInterval::FifteenMinutes)
            .await
            .unwrap();

        assert_eq!(response.message, "Fetched 2 records for 15m interval of TCS");
        assert_eq!(response.bars.len(), 2);
        assert_eq!(response.bars[1].timestamp, "2024-01-02 09:30:00");
        assert_eq!(response.bars[1].low.to_string(), "3805.05");
        assert_eq!(response.bars[0].volume, 4500);
    }

    #[tokio::test]
    async fn missing_or_corrupt_file_yields_no_bars() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);

        let response = service.fetch_bars("NIFTY", BarInterval::OneDay).await.unwrap();
        assert_eq!(response.message, "Fetched 0 records for 1d interval of NIFTY");
        assert!(response.bars.is_empty());

        std::fs::create_dir_all(dir.path().join("bars/1d")).unwrap();
        std::fs::write(
            dir.path().join("bars/1d/NIFTY.csv"),
            "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume\nNIFTY,1d,broken\n",
        )
        .unwrap();
        let response = service.fetch_bars("NIFTY", BarInterval::OneDay).await.unwrap();
        assert!(response.bars.is_empty());
    }

    #[tokio::test]
    async fn blank_or_path_like_symbol_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);

        for symbol in ["", "   ", "../secrets", "a/b", "a\\b"] {
            assert!(
                matches!(
                    service.fetch_bars(symbol, BarInterval::OneDay).await,
                    Err(Error::Validation(_))
                ),
                "{symbol:?} should be rejected"
            );
        }
    }
}
