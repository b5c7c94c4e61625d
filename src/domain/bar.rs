//! Price bar representation and sampling intervals.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;

/// One OHLCV sample. Timestamps are local exchange wall-clock time; daily
/// bars carry midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn daily(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp: date.and_time(NaiveTime::MIN),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Sampling interval of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minute(u32),
    Hour,
    Day,
}

impl Interval {
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Minute(n) => i64::from(*n) * 60,
            Interval::Hour => 3_600,
            Interval::Day => 86_400,
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Interval::Day)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Minute(n) => write!(f, "{}m", n),
            Interval::Hour => write!(f, "60m"),
            Interval::Day => write!(f, "1d"),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "day" | "daily" => Ok(Interval::Day),
            "1h" | "60m" | "hour" | "hourly" => Ok(Interval::Hour),
            other => {
                let minutes = other
                    .strip_suffix('m')
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|&n| n > 0)
                    .ok_or_else(|| format!("unknown interval '{}'", s))?;
                if minutes == 60 {
                    Ok(Interval::Hour)
                } else {
                    Ok(Interval::Minute(minutes))
                }
            }
        }
    }
}

/// A gateway answer: bars plus quality metadata. A non-empty `errors` list
/// signals soft degradation, not failure.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    pub bars: Vec<Bar>,
    pub quality_score: f64,
    pub data_age_seconds: Option<i64>,
    pub errors: Vec<String>,
}

impl BarSeries {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars whose calendar date equals `date`.
    pub fn on_date(&self, date: NaiveDate) -> Vec<Bar> {
        self.bars
            .iter()
            .filter(|b| b.date() == date)
            .cloned()
            .collect()
    }

    /// Bars strictly before `date`.
    pub fn before(&self, date: NaiveDate) -> &[Bar] {
        let end = self.bars.partition_point(|b| b.date() < date);
        &self.bars[..end]
    }
}
