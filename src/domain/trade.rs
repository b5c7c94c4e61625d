//! Terminal record of one scanned (ticker, earnings date).
//!
//! A `Trade` can only be built through the stage constructors, so a record
//! never claims a signal without a passed filter, or an exit without a
//! signal.

use crate::domain::earnings::EarningsEvent;
use crate::domain::exit::{DataQuality, ExitOutcome, ExitReason};
use crate::domain::signal::SignalEntry;
use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

fn hhmm<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => s.serialize_str(&t.format("%H:%M").to_string()),
        None => s.serialize_none(),
    }
}

/// Earnings figures carried on the trade, with the surprise verdict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarningsCheck {
    pub passed: bool,
    pub eps_estimate: Option<f64>,
    pub reported_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
    pub reason: Option<String>,
}

impl EarningsCheck {
    pub fn from_event(event: Option<&EarningsEvent>) -> Self {
        let Some(event) = event else {
            return Self {
                reason: Some("no earnings record for this date".to_string()),
                ..Default::default()
            };
        };
        let verdict = event.beat_estimate();
        Self {
            passed: verdict.is_ok(),
            eps_estimate: event.eps_estimate,
            reported_eps: event.reported_eps,
            surprise_pct: event.surprise_pct,
            reason: verdict.err().map(|miss| miss.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct Trade {
    pub ticker: String,
    pub date: NaiveDate,
    pub passed_filter: bool,
    pub filter_score: u8,
    pub passed_earnings_surprise: Option<bool>,
    pub eps_estimate: Option<f64>,
    pub reported_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
    pub signal_detected: bool,
    pub entry_price: Option<f64>,
    #[serde(serialize_with = "hhmm")]
    pub entry_time: Option<NaiveTime>,
    pub open_price: Option<f64>,
    pub vwap: Option<f64>,
    pub yesterday_close: Option<f64>,
    pub exit_price: Option<f64>,
    #[serde(serialize_with = "hhmm")]
    pub exit_time: Option<NaiveTime>,
    pub exit_reason: Option<ExitReason>,
    pub pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub data_quality: Option<DataQuality>,
    pub notes: Option<String>,
}

impl Trade {
    fn blank(ticker: &str, date: NaiveDate) -> Self {
        Trade {
            ticker: ticker.to_string(),
            date,
            passed_filter: false,
            filter_score: 0,
            passed_earnings_surprise: None,
            eps_estimate: None,
            reported_eps: None,
            surprise_pct: None,
            signal_detected: false,
            entry_price: None,
            entry_time: None,
            open_price: None,
            vwap: None,
            yesterday_close: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            pnl: None,
            pnl_pct: None,
            data_quality: None,
            notes: None,
        }
    }

    fn with_earnings(mut self, earnings: &EarningsCheck) -> Self {
        self.passed_earnings_surprise = Some(earnings.passed);
        self.eps_estimate = earnings.eps_estimate;
        self.reported_eps = earnings.reported_eps;
        self.surprise_pct = earnings.surprise_pct;
        self
    }

    pub fn filter_failed(ticker: &str, date: NaiveDate, score: u8, notes: impl Into<String>) -> Self {
        Trade {
            filter_score: score,
            notes: Some(notes.into()),
            ..Self::blank(ticker, date)
        }
    }

    pub fn earnings_failed(
        ticker: &str,
        date: NaiveDate,
        score: u8,
        earnings: &EarningsCheck,
        notes: impl Into<String>,
    ) -> Self {
        Trade {
            passed_filter: true,
            filter_score: score,
            notes: Some(notes.into()),
            ..Self::blank(ticker, date)
        }
        .with_earnings(earnings)
    }

    pub fn no_signal(
        ticker: &str,
        date: NaiveDate,
        score: u8,
        earnings: &EarningsCheck,
        notes: impl Into<String>,
    ) -> Self {
        Self::earnings_failed(ticker, date, score, earnings, notes)
    }

    pub fn executed(
        ticker: &str,
        date: NaiveDate,
        score: u8,
        earnings: &EarningsCheck,
        entry: &SignalEntry,
        exit: &ExitOutcome,
    ) -> Self {
        let pnl = exit.exit_price - entry.entry_price;
        let pnl_pct = pnl / entry.entry_price * 100.0;
        Trade {
            passed_filter: true,
            filter_score: score,
            signal_detected: true,
            entry_price: Some(entry.entry_price),
            entry_time: Some(entry.entry_time.time()),
            open_price: Some(entry.open_price),
            vwap: Some(entry.vwap),
            yesterday_close: Some(entry.yesterday_close),
            exit_price: Some(exit.exit_price),
            exit_time: Some(exit.exit_time),
            exit_reason: Some(exit.reason),
            pnl: Some(pnl),
            pnl_pct: Some(pnl_pct),
            data_quality: Some(exit.data_quality),
            notes: exit.note.clone(),
            ..Self::blank(ticker, date)
        }
        .with_earnings(earnings)
    }

    /// Entry and exit both happened.
    pub fn is_executed(&self) -> bool {
        self.pnl.is_some()
    }
}
