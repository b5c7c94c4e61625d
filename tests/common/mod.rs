#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use svea::domain::backtest::BacktestConfig;
pub use svea::domain::bar::{Bar, Interval};
pub use svea::domain::earnings::EarningsEvent;
use svea::domain::error::SveaError;
use svea::ports::data_port::MarketDataPort;

/// In-memory market data keyed by ticker and interval.
#[derive(Default)]
pub struct MockDataPort {
    pub bars: HashMap<(String, Interval), Vec<Bar>>,
    pub earnings: HashMap<String, Vec<EarningsEvent>>,
    pub errors: HashMap<String, String>,
    pub now: Option<NaiveDateTime>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: &str, interval: Interval, bars: Vec<Bar>) -> Self {
        let series = self.bars.entry((ticker.to_string(), interval)).or_default();
        series.extend(bars);
        series.sort_by_key(|b| b.timestamp);
        self
    }

    pub fn with_daily(self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.with_bars(ticker, Interval::Day, bars)
    }

    pub fn with_hourly(self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.with_bars(ticker, Interval::Hour, bars)
    }

    pub fn with_event(
        mut self,
        ticker: &str,
        date: NaiveDate,
        estimate: Option<f64>,
        reported: Option<f64>,
    ) -> Self {
        self.earnings
            .entry(ticker.to_string())
            .or_default()
            .push(EarningsEvent::new(ticker, date, estimate, reported, None));
        self
    }

    /// Every call for `ticker` fails upstream.
    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    fn check(&self, ticker: &str) -> Result<(), SveaError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(SveaError::UpstreamFetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<Bar>, SveaError> {
        self.check(ticker)?;
        Ok(self
            .bars
            .get(&(ticker.to_string(), interval))
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() >= start && b.date() <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsEvent>, SveaError> {
        self.check(ticker)?;
        Ok(self.earnings.get(ticker).cloned().unwrap_or_default())
    }

    fn clock_now(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    day.and_hms_opt(h, m, 0).unwrap()
}

/// `count` daily closes moving linearly from `from` to `to`, the last one
/// on the day before `event`.
pub fn daily_ramp(event: NaiveDate, count: usize, from: f64, to: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let c = from + (to - from) * i as f64 / (count - 1) as f64;
            let day = event - Duration::days((count - i) as i64);
            Bar::daily(day, c, c * 1.01, c * 0.99, c, 1_000_000.0)
        })
        .collect()
}

/// A strong uptrend ending the day before `event`, plus the event day's own
/// daily bar.
pub fn uptrend_with_event_day(event: NaiveDate) -> Vec<Bar> {
    let mut bars = daily_ramp(event, 300, 50.0, 150.0);
    bars.push(Bar::daily(event, 151.0, 156.0, 149.0, 155.0, 2_000_000.0));
    bars
}

pub fn bar_at(ts: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts,
        open,
        high,
        low,
        close,
        volume: 10_000.0,
    }
}

/// Hourly session relative to yesterday's close `y`: a flat 09:00 bar, a
/// +2.4 % breakout bar at 10:00, then `after` bars as (high, low, close)
/// multiples of `y` from 11:00 on.
pub fn session(day: NaiveDate, y: f64, after: &[(f64, f64, f64)]) -> Vec<Bar> {
    let mut bars = vec![
        bar_at(at(day, 9, 0), y * 1.002, y * 1.008, y * 1.000, y * 1.006),
        bar_at(at(day, 10, 0), y * 1.006, y * 1.026, y * 1.005, y * 1.024),
    ];
    for (i, &(h, l, c)) in after.iter().enumerate() {
        let prev = bars[bars.len() - 1].close;
        bars.push(bar_at(at(day, 11 + i as u32, 0), prev, y * h, y * l, y * c));
    }
    bars
}

pub fn backtest_config(tickers: &[&str], start: NaiveDate, end: NaiveDate) -> BacktestConfig {
    BacktestConfig {
        start_date: start,
        end_date: end,
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        workers: 1,
    }
}
