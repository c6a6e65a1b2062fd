//! Core types for marketdata-hub

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::Error;

/// India Standard Time offset in seconds (UTC+05:30)
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Candle width of a historical bar
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum BarInterval {
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 30 minutes
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
    /// 1 week
    #[serde(rename = "1w")]
    OneWeek,
}

impl BarInterval {
    /// Every supported interval, shortest first
    pub const ALL: [BarInterval; 9] = [
        BarInterval::OneMinute,
        BarInterval::FiveMinutes,
        BarInterval::FifteenMinutes,
        BarInterval::ThirtyMinutes,
        BarInterval::OneHour,
        BarInterval::FourHours,
        BarInterval::SixHours,
        BarInterval::OneDay,
        BarInterval::OneWeek,
    ];

    /// Short form used in URLs, file paths and CSV rows (e.g. "5m")
    pub fn as_str(&self) -> &'static str {
        match self {
            BarInterval::OneMinute => "1m",
            BarInterval::FiveMinutes => "5m",
            BarInterval::FifteenMinutes => "15m",
            BarInterval::ThirtyMinutes => "30m",
            BarInterval::OneHour => "1h",
            BarInterval::FourHours => "4h",
            BarInterval::SixHours => "6h",
            BarInterval::OneDay => "1d",
            BarInterval::OneWeek => "1w",
        }
    }

    /// Width in minutes
    pub fn minutes(&self) -> u32 {
        match self {
            BarInterval::OneMinute => 1,
            BarInterval::FiveMinutes => 5,
            BarInterval::FifteenMinutes => 15,
            BarInterval::ThirtyMinutes => 30,
            BarInterval::OneHour => 60,
            BarInterval::FourHours => 240,
            BarInterval::SixHours => 360,
            BarInterval::OneDay => 1440,
            BarInterval::OneWeek => 10080,
        }
    }

    /// `(period, bar)` query values for a history request
    ///
    /// Intervals without a dedicated mapping fall back to a year of daily bars.
    pub fn history_query(&self) -> (&'static str, &'static str) {
        match self {
            BarInterval::FiveMinutes => ("1w", "5min"),
            BarInterval::FifteenMinutes => ("1m", "15min"),
            BarInterval::OneHour => ("1m", "1h"),
            BarInterval::OneDay => ("1y", "1d"),
            _ => ("1y", "1d"),
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarInterval {
    type Err = Error;

    /// Case-insensitive parse of the short form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarInterval::ALL
            .into_iter()
            .find(|interval| interval.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInterval(s.to_string()))
    }
}

/// One OHLCV candle as written to the per-symbol bar files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Bar {
    /// Trading symbol
    pub symbol: String,
    /// Candle width
    pub interval: BarInterval,
    /// Candle open time in IST, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    /// Open price
    #[schema(value_type = String)]
    pub open: Decimal,
    /// High price
    #[schema(value_type = String)]
    pub high: Decimal,
    /// Low price
    #[schema(value_type = String)]
    pub low: Decimal,
    /// Close price
    #[schema(value_type = String)]
    pub close: Decimal,
    /// Traded volume
    pub volume: i64,
}

/// Render a Unix timestamp in milliseconds as India Standard Time
///
/// Returns `None` when the timestamp is out of range.
pub fn ist_timestamp(unix_ms: i64) -> Option<String> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    let utc = DateTime::from_timestamp_millis(unix_ms)?;
    Some(
        utc.with_timezone(&ist)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

/// A symbol and its current futures contract id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct SymbolContract {
    /// Trading symbol
    #[serde(rename = "Name")]
    pub name: String,
    /// Upstream contract id of the current futures contract
    #[serde(rename = "CurrentFuturesContractId")]
    pub contract_id: i64,
}

/// Queue and worker pool snapshot
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    /// Maximum number of unclaimed items
    pub capacity: usize,

    /// Items queued but not yet claimed by a worker
    pub pending: usize,

    /// Free queue positions
    pub free_slots: usize,

    /// Worker count of the running pool (configured count when stopped)
    pub workers: usize,

    /// Current pause between batches
    pub batch_delay_ms: u64,

    /// Whether the worker pool is running
    pub running: bool,
}

/// Result of one bulk download request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadSummary {
    /// Human-readable summary line
    pub message: String,

    /// Number of symbols requested
    pub requested: usize,

    /// Number of symbols that produced data
    pub retrieved: usize,
}

/// Bars read back from storage for one symbol and interval
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarketDataResponse {
    /// Human-readable summary line
    pub message: String,

    /// Stored bars in file order
    pub bars: Vec<Bar>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parsing_is_case_insensitive() {
        assert_eq!("5m".parse::<BarInterval>().unwrap(), BarInterval::FiveMinutes);
        assert_eq!("1H".parse::<BarInterval>().unwrap(), BarInterval::OneHour);
        assert_eq!(" 1d ".parse::<BarInterval>().unwrap(), BarInterval::OneDay);
    }

    #[test]
    fn unknown_interval_is_rejected() {
        for raw in ["", "7m", "5min", "daily"] {
            match raw.parse::<BarInterval>() {
                Err(Error::InvalidInterval(s)) => assert_eq!(s, raw),
                other => panic!("expected invalid interval for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn short_form_round_trips_through_display_and_serde() {
        for interval in BarInterval::ALL {
            assert_eq!(interval.to_string().parse::<BarInterval>().unwrap(), interval);
            let json = serde_json::to_string(&interval).unwrap();
            assert_eq!(json, format!("\"{}\"", interval.as_str()));
        }
    }

    #[test]
    fn minutes_grow_with_interval() {
        assert_eq!(BarInterval::OneMinute.minutes(), 1);
        assert_eq!(BarInterval::FourHours.minutes(), 240);
        assert_eq!(BarInterval::OneWeek.minutes(), 7 * 24 * 60);
        assert!(
            BarInterval::ALL
                .windows(2)
                .all(|w| w[0].minutes() < w[1].minutes())
        );
    }

    #[test]
    fn history_query_mapping() {
        assert_eq!(BarInterval::FiveMinutes.history_query(), ("1w", "5min"));
        assert_eq!(BarInterval::FifteenMinutes.history_query(), ("1m", "15min"));
        assert_eq!(BarInterval::OneHour.history_query(), ("1m", "1h"));
        assert_eq!(BarInterval::OneDay.history_query(), ("1y", "1d"));
        assert_eq!(BarInterval::ThirtyMinutes.history_query(), ("1y", "1d"));
        assert_eq!(BarInterval::OneWeek.history_query(), ("1y", "1d"));
    }

    #[test]
    fn ist_timestamp_applies_fixed_offset() {
        // 2024-01-02T03:45:00Z
        assert_eq!(
            ist_timestamp(1_704_167_100_000).unwrap(),
            "2024-01-02 09:15:00"
        );
        assert_eq!(ist_timestamp(0).unwrap(), "1970-01-01 05:30:00");
        assert!(ist_timestamp(i64::MAX).is_none());
    }

    #[test]
    fn symbol_contract_uses_file_column_names() {
        let json = serde_json::to_value(SymbolContract {
            name: "NIFTY".into(),
            contract_id: 42,
        })
        .unwrap();
        assert_eq!(json["Name"], "NIFTY");
        assert_eq!(json["CurrentFuturesContractId"], 42);
    }
}
