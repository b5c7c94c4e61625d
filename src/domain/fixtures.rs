//! Synthetic market data for unit tests.

use crate::domain::bar::{Bar, Interval};
use crate::domain::earnings::EarningsEvent;
use crate::domain::error::SveaError;
use crate::ports::data_port::MarketDataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct FixturePort {
    daily: HashMap<String, Vec<Bar>>,
    intraday: HashMap<String, Vec<Bar>>,
    earnings: HashMap<String, Vec<EarningsEvent>>,
    failing: HashSet<String>,
    now: Option<NaiveDateTime>,
}

impl FixturePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_daily(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.daily.entry(ticker.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_intraday(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        let series = self.intraday.entry(ticker.to_string()).or_default();
        series.extend(bars);
        series.sort_by_key(|b| b.timestamp);
        self
    }

    pub fn with_earnings(mut self, event: EarningsEvent) -> Self {
        self.earnings
            .entry(event.ticker.clone())
            .or_default()
            .push(event);
        self
    }

    pub fn failing(mut self, ticker: &str) -> Self {
        self.failing.insert(ticker.to_string());
        self
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }
}

impl MarketDataPort for FixturePort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Bar>, SveaError> {
        if self.failing.contains(ticker) {
            return Err(SveaError::UpstreamFetch {
                ticker: ticker.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let source = if interval.is_intraday() {
            &self.intraday
        } else {
            &self.daily
        };
        Ok(source
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() >= start && b.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsEvent>, SveaError> {
        if self.failing.contains(ticker) {
            return Err(SveaError::no_data(ticker, "no calendar"));
        }
        Ok(self.earnings.get(ticker).cloned().unwrap_or_default())
    }

    fn clock_now(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}

/// `count` daily bars rising linearly from 50 to 150, the last on `end`.
pub fn uptrend_daily(end: NaiveDate, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let c = 50.0 + 100.0 * i as f64 / (count - 1) as f64;
            let date = end - Duration::days((count - 1 - i) as i64);
            Bar::daily(date, c, c * 1.01, c * 0.99, c, 1_000_000.0)
        })
        .collect()
}

/// `count` daily bars falling linearly from 150 to 50.
pub fn downtrend_daily(end: NaiveDate, count: usize) -> Vec<Bar> {
    uptrend_daily(end, count)
        .into_iter()
        .rev()
        .zip(uptrend_daily(end, count))
        .map(|(price, slot)| Bar {
            timestamp: slot.timestamp,
            ..price
        })
        .collect()
}

pub fn intraday_bar(date: NaiveDate, hour: u32, o: f64, h: f64, l: f64, c: f64) -> Bar {
    Bar {
        timestamp: date.and_hms_opt(hour, 0, 0).unwrap_or_default(),
        open: o,
        high: h,
        low: l,
        close: c,
        volume: 10_000.0,
    }
}

/// Hourly session that breaks out at 10:00 (+2.4 % over `y`) and drifts up
/// to the close without touching the stop.
pub fn breakout_session(date: NaiveDate, y: f64) -> Vec<Bar> {
    let mut bars = vec![
        intraday_bar(date, 9, y * 1.002, y * 1.008, y * 1.000, y * 1.006),
        intraday_bar(date, 10, y * 1.006, y * 1.026, y * 1.005, y * 1.024),
    ];
    for hour in 11..=17 {
        let drift = 1.024 + 0.001 * (hour - 10) as f64;
        bars.push(intraday_bar(
            date,
            hour,
            y * (drift - 0.001),
            y * (drift + 0.002),
            y * (drift - 0.003),
            y * drift,
        ));
    }
    bars
}

/// Hourly session that never clears +2 % over `y`.
pub fn quiet_session(date: NaiveDate, y: f64) -> Vec<Bar> {
    (9..=17)
        .map(|hour| intraday_bar(date, hour, y * 1.004, y * 1.008, y * 1.002, y * 1.005))
        .collect()
}
