//! Backtest engine: every earnings event of every ticker through the trade
//! pipeline, then metrics over the lot.
//!
//! Tickers are independent. With `workers > 1` they are fanned out over a
//! private rayon pool; results are collected in ticker order, so the output
//! matches a sequential run exactly.

use crate::domain::earnings::EarningsScanner;
use crate::domain::error::SveaError;
use crate::domain::metrics::Metrics;
use crate::domain::simulator::TradeSimulator;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::Trade;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub tickers: Vec<String>,
    pub workers: usize,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), SveaError> {
        if self.start_date > self.end_date {
            return Err(SveaError::invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
        if self.tickers.is_empty() {
            return Err(SveaError::ConfigMissing {
                section: "backtest".to_string(),
                key: "tickers".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(SveaError::invalid("backtest", "workers", "workers must be at least 1"));
        }
        Ok(())
    }
}

/// A ticker whose calendar could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub metrics: Metrics,
    pub trades: Vec<Trade>,
    pub earnings_days_found: usize,
    pub tickers_tested: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub skipped: Vec<SkippedTicker>,
}

#[derive(Debug, Clone)]
pub struct VariantResult {
    pub strategy: StrategyConfig,
    pub result: BacktestResult,
}

struct TickerRun {
    trades: Vec<Trade>,
    events: usize,
    skipped: Option<SkippedTicker>,
}

pub struct BacktestEngine<'a> {
    port: &'a dyn MarketDataPort,
    strategy: &'a StrategyConfig,
    simulator: TradeSimulator<'a>,
    workers: usize,
}

impl<'a> BacktestEngine<'a> {
    /// Fails on an invalid strategy before any ticker is touched.
    pub fn new(port: &'a dyn MarketDataPort, strategy: &'a StrategyConfig) -> Result<Self, SveaError> {
        Ok(Self {
            port,
            strategy,
            simulator: TradeSimulator::new(port, strategy)?,
            workers: 1,
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run_backtest(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> BacktestResult {
        info!(
            strategy = %self.strategy.name,
            tickers = tickers.len(),
            %start,
            %end,
            workers = self.workers,
            "starting backtest"
        );

        let runs = self.run_all(tickers, start, end);

        let mut trades = Vec::new();
        let mut earnings_days_found = 0;
        let mut skipped = Vec::new();
        for run in runs {
            earnings_days_found += run.events;
            trades.extend(run.trades);
            skipped.extend(run.skipped);
        }

        let metrics = Metrics::compute(&trades);
        info!(
            events = earnings_days_found,
            executed = metrics.trades_executed,
            skipped = skipped.len(),
            "backtest complete"
        );

        BacktestResult {
            metrics,
            trades,
            earnings_days_found,
            tickers_tested: tickers.len(),
            start_date: start,
            end_date: end,
            skipped,
        }
    }

    fn run_all(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> Vec<TickerRun> {
        if self.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| {
                        tickers
                            .par_iter()
                            .map(|t| self.run_ticker(t, start, end))
                            .collect()
                    });
                }
                Err(e) => warn!(error = %e, "thread pool unavailable, running sequentially"),
            }
        }
        tickers
            .iter()
            .map(|t| self.run_ticker(t, start, end))
            .collect()
    }

    fn run_ticker(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> TickerRun {
        let events = match EarningsScanner::new(self.port).try_scan(ticker, start, end) {
            Ok(events) => events,
            Err(e) => {
                warn!(ticker, error = %e, "skipping ticker");
                return TickerRun {
                    trades: Vec::new(),
                    events: 0,
                    skipped: Some(SkippedTicker {
                        ticker: ticker.to_string(),
                        reason: e.to_string(),
                    }),
                };
            }
        };
        if events.is_empty() {
            info!(ticker, "no earnings dates in period");
        }

        let trades = events.iter().map(|e| self.simulator.simulate_event(e)).collect();
        TickerRun {
            trades,
            events: events.len(),
            skipped: None,
        }
    }
}

/// Run every strategy variant over the same tickers and period.
pub fn compare_variants(
    port: &dyn MarketDataPort,
    base: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<Vec<VariantResult>, SveaError> {
    base.variants()
        .into_iter()
        .map(|strategy| {
            let result = BacktestEngine::new(port, &strategy)?
                .with_workers(config.workers)
                .run_backtest(&config.tickers, config.start_date, config.end_date);
            Ok(VariantResult { strategy, result })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::earnings::EarningsEvent;
    use crate::domain::fixtures::{breakout_session, quiet_session, uptrend_daily, FixturePort};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn sample_config() -> BacktestConfig {
        BacktestConfig {
            start_date: d(1, 1),
            end_date: d(12, 31),
            tickers: vec!["ABB".to_string(), "SAND".to_string()],
            workers: 1,
        }
    }

    fn port() -> FixturePort {
        let event_day = d(4, 25);
        let daily = uptrend_daily(event_day, 300);
        let y = daily[daily.len() - 2].close;
        FixturePort::new()
            .with_daily("ABB", daily.clone())
            .with_intraday("ABB", breakout_session(event_day, y))
            .with_earnings(EarningsEvent::new("ABB", event_day, Some(1.0), Some(1.2), None))
            .with_daily("SAND", daily)
            .with_intraday("SAND", quiet_session(event_day, y))
            .with_earnings(EarningsEvent::new("SAND", event_day, Some(1.0), Some(0.9), None))
            .with_earnings(EarningsEvent::new("SAND", d(7, 18), None, None, None))
    }

    #[test]
    fn config_validation() {
        assert!(sample_config().validate().is_ok());
        let bad = BacktestConfig {
            start_date: d(12, 31),
            end_date: d(1, 1),
            ..sample_config()
        };
        assert!(bad.validate().is_err());
        let empty = BacktestConfig {
            tickers: vec![],
            ..sample_config()
        };
        assert!(matches!(empty.validate(), Err(SveaError::ConfigMissing { .. })));
    }

    #[test]
    fn collects_every_event() {
        let port = port();
        let strategy = StrategyConfig::default();
        let cfg = sample_config();
        let result = BacktestEngine::new(&port, &strategy).unwrap().run_backtest(&cfg.tickers, cfg.start_date, cfg.end_date);
        assert_eq!(result.earnings_days_found, 3);
        assert_eq!(result.trades.len(), 3);
        assert_eq!(result.tickers_tested, 2);
        assert_eq!(result.metrics.trades_executed, 1);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn failing_ticker_is_skipped_not_fatal() {
        let port = port().failing("BAD");
        let strategy = StrategyConfig::default();
        let tickers = vec!["BAD".to_string(), "ABB".to_string()];
        let result = BacktestEngine::new(&port, &strategy).unwrap().run_backtest(&tickers, d(1, 1), d(12, 31));
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].ticker, "BAD");
        assert_eq!(result.metrics.trades_executed, 1);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let port = port();
        let strategy = StrategyConfig::default();
        let cfg = sample_config();
        let seq = BacktestEngine::new(&port, &strategy).unwrap().run_backtest(&cfg.tickers, cfg.start_date, cfg.end_date);
        let par = BacktestEngine::new(&port, &strategy).unwrap()
            .with_workers(4)
            .run_backtest(&cfg.tickers, cfg.start_date, cfg.end_date);
        assert_eq!(seq.trades, par.trades);
        assert_eq!(seq.metrics, par.metrics);
    }

    #[test]
    fn variants_differ_only_by_flags() {
        let port = port();
        let results = compare_variants(&port, &StrategyConfig::default(), &sample_config()).unwrap();
        assert_eq!(results.len(), 4);
        // ABB beat estimates, so the earnings filter keeps its trade
        for v in &results {
            assert_eq!(v.result.metrics.trades_executed, 1);
            assert_eq!(v.result.trades.len(), 3);
        }
        let filtered = &results[1];
        assert!(filtered.strategy.use_earnings_surprise_filter);
        let sand = filtered
            .result
            .trades
            .iter()
            .find(|t| t.ticker == "SAND" && t.date == d(4, 25))
            .unwrap();
        assert_eq!(sand.passed_earnings_surprise, Some(false));
        assert!(!sand.signal_detected);
    }
}
