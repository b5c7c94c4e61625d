//! Daily watchlist: tickers reporting on a date that pass the trend filter,
//! best score first.

use crate::domain::bar::Interval;
use crate::domain::earnings::EarningsScanner;
use crate::domain::error::SveaError;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trend::TrendScorer;
use crate::ports::data_port::MarketDataPort;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub date: NaiveDate,
    pub trend_score: u8,
    pub current_price: Option<f64>,
    pub yesterday_close: Option<f64>,
    pub sma_200: Option<f64>,
    pub return_3m: Option<f64>,
    pub return_1y: Option<f64>,
    pub eps_estimate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistSummary {
    pub total: usize,
    pub avg_score: f64,
    pub avg_return_3m: f64,
    pub avg_return_1y: f64,
    pub top_ticker: Option<String>,
    /// (lowest, highest) score.
    pub score_range: Option<(u8, u8)>,
}

impl WatchlistSummary {
    pub fn from_entries(entries: &[WatchlistEntry]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        let avg = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let scores: Vec<u8> = entries.iter().map(|e| e.trend_score).collect();
        let min = scores.iter().copied().min().unwrap_or_default();
        let max = scores.iter().copied().max().unwrap_or_default();
        Self {
            total: entries.len(),
            avg_score: avg(scores.iter().map(|&s| f64::from(s)).collect()),
            avg_return_3m: avg(entries.iter().filter_map(|e| e.return_3m).collect()),
            avg_return_1y: avg(entries.iter().filter_map(|e| e.return_1y).collect()),
            top_ticker: entries.first().map(|e| e.ticker.clone()),
            score_range: Some((min, max)),
        }
    }
}

pub struct Screener<'a> {
    port: &'a dyn MarketDataPort,
    config: &'a StrategyConfig,
    trend: TrendScorer,
}

impl<'a> Screener<'a> {
    pub fn new(port: &'a dyn MarketDataPort, config: &'a StrategyConfig) -> Result<Self, SveaError> {
        Ok(Self {
            port,
            config,
            trend: TrendScorer::new(config)?,
        })
    }

    /// Screen `tickers` for `date`. Only tickers with an earnings event that
    /// day are considered; trend is judged on history before the date.
    pub fn run(&self, date: NaiveDate, tickers: &[String]) -> Vec<WatchlistEntry> {
        info!(%date, candidates = tickers.len(), "running screen");
        let scanner = EarningsScanner::new(self.port);
        let start = date - Duration::days(self.config.history_calendar_days());

        let mut watchlist: Vec<WatchlistEntry> = tickers
            .iter()
            .filter_map(|ticker| {
                let event = scanner.event_on(ticker, date)?;
                let daily = self.port.get_historical(ticker, start, date, Interval::Day);
                if daily.is_empty() {
                    warn!(ticker, errors = ?daily.errors, "no daily history");
                    return None;
                }
                let a = self.trend.evaluate(ticker, daily.before(date));
                if !a.passes {
                    debug!(ticker, reason = %a.failure_reason(), "failed trend filter");
                    return None;
                }
                info!(ticker, score = a.score, "passed trend filter");
                Some(WatchlistEntry {
                    ticker: ticker.clone(),
                    date,
                    trend_score: a.score,
                    current_price: a.current_price,
                    yesterday_close: a.yesterday_close,
                    sma_200: a.sma_200,
                    return_3m: a.return_3m,
                    return_1y: a.return_1y,
                    eps_estimate: event.eps_estimate,
                })
            })
            .collect();

        watchlist.sort_by(|a, b| b.trend_score.cmp(&a.trend_score));
        info!(%date, passed = watchlist.len(), "screen complete");
        watchlist
    }
}
