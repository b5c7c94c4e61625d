//! Earnings event discovery and the earnings-surprise check.

use crate::domain::error::SveaError;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct EarningsEvent {
    pub ticker: String,
    pub date: NaiveDate,
    pub eps_estimate: Option<f64>,
    pub reported_eps: Option<f64>,
    pub surprise_pct: Option<f64>,
}

/// Why an event failed the surprise check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurpriseMiss {
    MissingEps,
    MissedOrMet,
}

impl fmt::Display for SurpriseMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurpriseMiss::MissingEps => write!(f, "missing EPS estimate or reported data"),
            SurpriseMiss::MissedOrMet => write!(f, "earnings missed or met estimates"),
        }
    }
}

impl EarningsEvent {
    /// Non-finite provider values are stored as missing.
    pub fn new(
        ticker: &str,
        date: NaiveDate,
        eps_estimate: Option<f64>,
        reported_eps: Option<f64>,
        surprise_pct: Option<f64>,
    ) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            ticker: ticker.to_string(),
            date,
            eps_estimate: finite(eps_estimate),
            reported_eps: finite(reported_eps),
            surprise_pct: finite(surprise_pct),
        }
    }

    /// Passes only when both EPS figures exist and reported beats estimate.
    pub fn beat_estimate(&self) -> Result<(), SurpriseMiss> {
        match (self.reported_eps, self.eps_estimate) {
            (Some(reported), Some(estimate)) if reported > estimate => Ok(()),
            (Some(_), Some(_)) => Err(SurpriseMiss::MissedOrMet),
            _ => Err(SurpriseMiss::MissingEps),
        }
    }
}

/// Enumerates report dates from the provider's earnings calendar. Pure
/// enumeration: no filtering beyond the date range.
pub struct EarningsScanner<'a> {
    port: &'a dyn MarketDataPort,
}

impl<'a> EarningsScanner<'a> {
    pub fn new(port: &'a dyn MarketDataPort) -> Self {
        Self { port }
    }

    /// Events with `start <= date <= end`, sorted by date, one per date.
    /// Provider failures yield an empty list.
    pub fn scan(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Vec<EarningsEvent> {
        self.try_scan(ticker, start, end).unwrap_or_else(|e| {
            warn!(ticker, error = %e, "no earnings calendar");
            Vec::new()
        })
    }

    /// Like [`scan`](Self::scan) but surfaces the provider error.
    pub fn try_scan(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EarningsEvent>, SveaError> {
        let all = self.port.fetch_earnings(ticker)?;

        let mut events: Vec<EarningsEvent> = all
            .into_iter()
            .filter(|e| e.date >= start && e.date <= end)
            .collect();
        events.sort_by_key(|e| e.date);
        // keep the latest calendar entry for a repeated date
        events.reverse();
        events.dedup_by_key(|e| e.date);
        events.reverse();

        for event in &events {
            debug!(
                ticker,
                date = %event.date,
                eps_estimate = ?event.eps_estimate,
                reported_eps = ?event.reported_eps,
                "earnings date found"
            );
        }
        info!(ticker, count = events.len(), %start, %end, "earnings dates in period");
        Ok(events)
    }

    /// The calendar entry for exactly `date`, if any.
    pub fn event_on(&self, ticker: &str, date: NaiveDate) -> Option<EarningsEvent> {
        self.scan(ticker, date, date).into_iter().next()
    }
}
