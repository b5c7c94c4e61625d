//! CSV directory data adapter.
//!
//! Layout, one file per ticker and interval:
//!
//! ```text
//! VOLV-B.ST_1d.csv        timestamp,open,high,low,close,volume
//! VOLV-B.ST_60m.csv       timestamp,open,high,low,close,volume
//! VOLV-B.ST_earnings.csv  date,eps_estimate,reported_eps,surprise_pct
//! ```
//!
//! Timestamps are `YYYY-MM-DD` or `YYYY-MM-DD HH:MM[:SS]` local exchange time.
//! Empty EPS cells are missing values.

use crate::domain::bar::{Bar, Interval};
use crate::domain::earnings::EarningsEvent;
use crate::domain::error::SveaError;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use tracing::debug;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct EarningsRow {
    date: String,
    eps_estimate: Option<f64>,
    reported_eps: Option<f64>,
    surprise_pct: Option<f64>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn bars_path(&self, ticker: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", ticker, interval))
    }

    fn earnings_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}_earnings.csv", ticker))
    }

    fn open(&self, ticker: &str, path: PathBuf) -> Result<csv::Reader<File>, SveaError> {
        let file = File::open(&path).map_err(|e| {
            SveaError::no_data(ticker, format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Bar>, SveaError> {
        let mut reader = self.open(ticker, self.bars_path(ticker, interval))?;
        let mut bars = Vec::new();

        for (line, result) in reader.deserialize::<BarRow>().enumerate() {
            let row = result.map_err(|e| SveaError::malformed(ticker, e.to_string()))?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                SveaError::malformed(
                    ticker,
                    format!("row {}: invalid timestamp '{}'", line + 2, row.timestamp),
                )
            })?;
            let date = timestamp.date();
            if date < start || date > end {
                continue;
            }
            bars.push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        debug!(ticker, %interval, rows = bars.len(), "read bars from csv");
        Ok(bars)
    }

    fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsEvent>, SveaError> {
        let mut reader = self.open(ticker, self.earnings_path(ticker))?;
        let mut events = Vec::new();

        for result in reader.deserialize::<EarningsRow>() {
            let row = result.map_err(|e| SveaError::malformed(ticker, e.to_string()))?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                SveaError::malformed(ticker, format!("invalid earnings date '{}': {}", row.date, e))
            })?;
            events.push(EarningsEvent::new(
                ticker,
                date,
                row.eps_estimate,
                row.reported_eps,
                row.surprise_pct,
            ));
        }

        Ok(events)
    }

    fn is_available(&self) -> bool {
        self.base_path.is_dir()
    }
}
