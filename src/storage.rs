//! Flat-file CSV storage
//!
//! All file names are resolved against one root directory. Reads tolerate a
//! missing file (warning plus empty result); writes create parent directories
//! and replace the file. The `csv` crate does the actual work on the blocking
//! thread pool.

use crate::config::FileStorageSettings;
use crate::error::{Error, Result};
use crate::types::{Bar, SymbolContract};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A row type with a fixed CSV header
///
/// The header must list the serde field names in declaration order.
pub trait CsvRecord: Serialize {
    /// Column names written as the first line of every file
    const HEADER: &'static [&'static str];
}

impl CsvRecord for SymbolContract {
    const HEADER: &'static [&'static str] = &["Name", "CurrentFuturesContractId"];
}

impl CsvRecord for Bar {
    const HEADER: &'static [&'static str] = &[
        "Symbol",
        "Interval",
        "Timestamp",
        "Open",
        "High",
        "Low",
        "Close",
        "Volume",
    ];
}

/// CSV reader/writer rooted at a storage directory
#[derive(Clone, Debug)]
pub struct CsvFileStore {
    root: PathBuf,
}

impl CsvFileStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at the configured storage directory
    pub fn from_settings(settings: &FileStorageSettings) -> Self {
        Self::new(settings.directory.clone())
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of `file_name`
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.trim().is_empty() {
            return Err(Error::Validation("file name must not be blank".into()));
        }
        Ok(self.root.join(file_name))
    }

    /// First column of every data row; the header row is skipped
    pub async fn read_symbols(&self, file_name: &str) -> Result<Vec<String>> {
        let rows = self.read_rows(file_name).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|symbol| !symbol.is_empty())
            .collect())
    }

    /// `(symbol, contract id)` rows from the first two columns
    pub async fn read_contracts(&self, file_name: &str) -> Result<Vec<SymbolContract>> {
        let rows = self.read_rows(file_name).await?;
        let mut contracts = Vec::with_capacity(rows.len());

        // Data rows start on line 2
        for (line, row) in (2..).zip(rows) {
            let (Some(name), Some(raw_id)) = (row.first(), row.get(1)) else {
                return Err(Error::Validation(format!(
                    "{file_name}: line {line}: expected symbol and contract id"
                )));
            };
            let contract_id = raw_id.parse::<i64>().map_err(|e| {
                Error::Validation(format!(
                    "{file_name}: line {line}: invalid contract id '{raw_id}': {e}"
                ))
            })?;
            contracts.push(SymbolContract {
                name: name.clone(),
                contract_id,
            });
        }

        Ok(contracts)
    }

    /// Write `records` under a header row, replacing the file
    ///
    /// The header is written even when `records` is empty. Returns the number
    /// of records written.
    pub async fn write_records<T>(&self, file_name: &str, records: Vec<T>) -> Result<usize>
    where
        T: CsvRecord + Send + 'static,
    {
        let path = self.resolve(file_name)?;
        let count = records.len();
        tracing::info!(file = file_name, records = count, "Writing CSV file");

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&path)?;
            writer.write_record(T::HEADER)?;
            for record in &records {
                writer.serialize(record)?;
            }
            writer.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("CSV write task failed: {e}")))??;

        Ok(count)
    }

    /// Bars stored in a per-symbol bar file
    ///
    /// Every data row must carry the eight bar columns. A missing file reads
    /// as no bars.
    pub async fn read_bars(&self, file_name: &str) -> Result<Vec<Bar>> {
        let rows = self.read_rows(file_name).await?;
        let mut bars = Vec::with_capacity(rows.len());

        for (line, row) in (2..).zip(rows) {
            let bar = parse_bar_row(&row).map_err(|reason| {
                Error::Validation(format!("{file_name}: line {line}: {reason}"))
            })?;
            bars.push(bar);
        }

        Ok(bars)
    }

    async fn read_rows(&self, file_name: &str) -> Result<Vec<Vec<String>>> {
        let path = self.resolve(file_name)?;
        tracing::info!(file = file_name, "Reading CSV file");

        let rows = tokio::task::spawn_blocking(move || -> Result<Option<Vec<Vec<String>>>> {
            if !path.exists() {
                return Ok(None);
            }
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_path(&path)?;

            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record?;
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(Some(rows))
        })
        .await
        .map_err(|e| Error::Other(format!("CSV read task failed: {e}")))??;

        match rows {
            Some(rows) => Ok(rows),
            None => {
                tracing::warn!(
                    path = %self.root.join(file_name).display(),
                    "CSV file not found"
                );
                Ok(Vec::new())
            }
        }
    }
}

fn parse_bar_row(row: &[String]) -> std::result::Result<Bar, String> {
    let [symbol, interval, timestamp, open, high, low, close, volume] = row else {
        return Err(format!("expected 8 bar columns, found {}", row.len()));
    };

    let price = |column: &str, raw: &str| {
        raw.parse::<Decimal>()
            .map_err(|e| format!("invalid {column} '{raw}': {e}"))
    };

    Ok(Bar {
        symbol: symbol.clone(),
        interval: interval.parse().map_err(|e: Error| e.to_string())?,
        timestamp: timestamp.clone(),
        open: price("open", open)?,
        high: price("high", high)?,
        low: price("low", low)?,
        close: price("close", close)?,
        volume: volume
            .parse()
            .map_err(|e| format!("invalid volume '{volume}': {e}"))?,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, BarInterval};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn store() -> (TempDir, CsvFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvFileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let (_dir, store) = store();
        assert!(store.read_symbols("absent.csv").await.unwrap().is_empty());
        assert!(store.read_contracts("absent.csv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn header_only_file_reads_as_empty() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("symbols.csv"), "Symbol\n").unwrap();
        assert!(store.read_symbols("symbols.csv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn symbols_come_from_first_column() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join("symbols.csv"),
            "Symbol,Sector\nNIFTY,Index\nRELIANCE,Energy\n\nTCS\n",
        )
        .unwrap();

        let symbols = store.read_symbols("symbols.csv").await.unwrap();
        assert_eq!(symbols, vec!["NIFTY", "RELIANCE", "TCS"]);
    }

    #[tokio::test]
    async fn contracts_round_trip_through_write_and_read() {
        let (_dir, store) = store();
        let contracts = vec![
            SymbolContract {
                name: "NIFTY".into(),
                contract_id: 711_280_073,
            },
            SymbolContract {
                name: "BANKNIFTY".into(),
                contract_id: 711_280_070,
            },
        ];

        let written = store
            .write_records("nested/contracts.csv", contracts.clone())
            .await
            .unwrap();
        assert_eq!(written, 2);

        let raw = std::fs::read_to_string(store.root().join("nested/contracts.csv")).unwrap();
        assert!(raw.starts_with("Name,CurrentFuturesContractId\n"));

        let read = store.read_contracts("nested/contracts.csv").await.unwrap();
        assert_eq!(read, contracts);
    }

    #[tokio::test]
    async fn invalid_contract_id_names_the_line() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join("contracts.csv"),
            "Name,CurrentFuturesContractId\nNIFTY,1\nTCS,abc\n",
        )
        .unwrap();

        match store.read_contracts("contracts.csv").await {
            Err(Error::Validation(msg)) => assert!(msg.contains("line 3"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn nifty_bar() -> Bar {
        Bar {
            symbol: "NIFTY".into(),
            interval: BarInterval::FiveMinutes,
            timestamp: "2024-01-02 09:15:00".into(),
            open: Decimal::from_str("21700.5").unwrap(),
            high: Decimal::from_str("21750").unwrap(),
            low: Decimal::from_str("21690.25").unwrap(),
            close: Decimal::from_str("21740.1").unwrap(),
            volume: 1200,
        }
    }

    #[tokio::test]
    async fn bars_are_written_with_pascal_case_header() {
        let (_dir, store) = store();
        store
            .write_records("bars/5m/NIFTY.csv", vec![nifty_bar()])
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.root().join("bars/5m/NIFTY.csv")).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume"
        );
        assert_eq!(
            lines.next().unwrap(),
            "NIFTY,5m,2024-01-02 09:15:00,21700.5,21750,21690.25,21740.1,1200"
        );
    }

    #[tokio::test]
    async fn writing_replaces_previous_content() {
        let (_dir, store) = store();
        store
            .write_records(
                "retry.csv",
                vec![SymbolContract {
                    name: "A".into(),
                    contract_id: 1,
                }],
            )
            .await
            .unwrap();
        store
            .write_records::<SymbolContract>("retry.csv", Vec::new())
            .await
            .unwrap();

        assert!(store.read_contracts("retry.csv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_write_still_has_a_header() {
        let (_dir, store) = store();
        let written = store
            .write_records::<SymbolContract>("retry.csv", Vec::new())
            .await
            .unwrap();
        assert_eq!(written, 0);

        let raw = std::fs::read_to_string(store.root().join("retry.csv")).unwrap();
        assert_eq!(raw, "Name,CurrentFuturesContractId\n");

        store
            .write_records::<Bar>("bars/1d/TCS.csv", Vec::new())
            .await
            .unwrap();
        let raw = std::fs::read_to_string(store.root().join("bars/1d/TCS.csv")).unwrap();
        assert_eq!(raw, "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume\n");
    }

    #[tokio::test]
    async fn bars_round_trip_through_write_and_read() {
        let (_dir, store) = store();
        let mut second = nifty_bar();
        second.timestamp = "2024-01-02 09:20:00".into();
        second.volume = 0;
        let bars = vec![nifty_bar(), second];

        store
            .write_records("bars/5m/NIFTY.csv", bars.clone())
            .await
            .unwrap();

        let read = store.read_bars("bars/5m/NIFTY.csv").await.unwrap();
        assert_eq!(read, bars);
        assert!(store.read_bars("bars/5m/ABSENT.csv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_bar_row_names_the_line() {
        let (dir, store) = store();
        std::fs::write(
            dir.path().join("bars.csv"),
            "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume\n\
             NIFTY,5m,2024-01-02 09:15:00,1,2,0.5,1.5,10\n\
             NIFTY,5m,2024-01-02 09:20:00,1,2,0.5,oops,10\n",
        )
        .unwrap();

        match store.read_bars("bars.csv").await {
            Err(Error::Validation(msg)) => {
                assert!(msg.contains("line 3"), "{msg}");
                assert!(msg.contains("close"), "{msg}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_file_name_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read_symbols("  ").await,
            Err(Error::Validation(_))
        ));
    }
}
