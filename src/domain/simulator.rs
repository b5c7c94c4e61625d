//! Per-event pipeline: trend filter, earnings surprise, signal, exit.
//!
//! Stages run in strict order and short-circuit. Each stage returns
//! `Result<_, StageFailure>`; the first failure becomes the trade's notes.

use crate::domain::bar::{Bar, BarSeries, Interval};
use crate::domain::earnings::{EarningsEvent, EarningsScanner};
use crate::domain::error::SveaError;
use crate::domain::exit::{ExitOutcome, ExitSimulator};
use crate::domain::signal::{SignalEntry, SignalEvaluator, SignalOutcome};
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::{EarningsCheck, Trade};
use crate::domain::trend::TrendScorer;
use crate::ports::data_port::MarketDataPort;
use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub reason: String,
}

impl StageFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<SveaError> for StageFailure {
    fn from(err: SveaError) -> Self {
        Self::new(err.to_string())
    }
}

pub struct TradeSimulator<'a> {
    port: &'a dyn MarketDataPort,
    config: &'a StrategyConfig,
    trend: TrendScorer,
    exit: ExitSimulator,
}

impl<'a> TradeSimulator<'a> {
    pub fn new(port: &'a dyn MarketDataPort, config: &'a StrategyConfig) -> Result<Self, SveaError> {
        Ok(Self {
            port,
            config,
            trend: TrendScorer::new(config)?,
            exit: ExitSimulator::new(config),
        })
    }

    /// Simulate `ticker` on `date`, looking the earnings record up from the
    /// provider's calendar.
    pub fn simulate_trade(&self, ticker: &str, date: NaiveDate) -> Trade {
        let event = EarningsScanner::new(self.port).event_on(ticker, date);
        self.simulate(ticker, date, event.as_ref())
    }

    /// Simulate an already-scanned event.
    pub fn simulate_event(&self, event: &EarningsEvent) -> Trade {
        self.simulate(&event.ticker, event.date, Some(event))
    }

    fn simulate(&self, ticker: &str, date: NaiveDate, event: Option<&EarningsEvent>) -> Trade {
        info!(ticker, %date, strategy = %self.config.name, "simulating trade");

        let start = date - Duration::days(self.config.history_calendar_days());
        let daily = self.port.get_historical(ticker, start, date, Interval::Day);

        let score = match self.trend_stage(ticker, date, &daily) {
            Ok(score) => score,
            Err(f) => {
                debug!(ticker, %date, reason = %f.reason, "filtered out");
                return Trade::filter_failed(ticker, date, 0, f.reason);
            }
        };

        let earnings = EarningsCheck::from_event(event);
        if self.config.use_earnings_surprise_filter && !earnings.passed {
            let reason = earnings
                .reason
                .clone()
                .unwrap_or_else(|| "failed earnings surprise filter".to_string());
            return Trade::earnings_failed(ticker, date, score, &earnings, reason);
        }

        let (entry, session) = match self.signal_stage(ticker, date, &daily) {
            Ok(found) => found,
            Err(f) => {
                debug!(ticker, %date, reason = %f.reason, "no signal");
                return Trade::no_signal(ticker, date, score, &earnings, f.reason);
            }
        };

        let exit = self.exit_stage(&entry, &session, date, &daily);
        let trade = Trade::executed(ticker, date, score, &earnings, &entry, &exit);
        info!(
            ticker,
            %date,
            entry = entry.entry_price,
            exit = exit.exit_price,
            reason = %exit.reason,
            pnl_pct = trade.pnl_pct.unwrap_or_default(),
            "trade closed"
        );
        trade
    }

    fn trend_stage(&self, ticker: &str, date: NaiveDate, daily: &BarSeries) -> Result<u8, StageFailure> {
        if daily.is_empty() {
            let reason = if daily.errors.is_empty() {
                "no daily data".to_string()
            } else {
                daily.errors.join("; ")
            };
            return Err(StageFailure::new(reason));
        }
        let assessment = self.trend.evaluate(ticker, daily.before(date));
        if assessment.passes {
            Ok(assessment.score)
        } else {
            Err(StageFailure::new(assessment.failure_reason()))
        }
    }

    fn signal_stage(
        &self,
        ticker: &str,
        date: NaiveDate,
        daily: &BarSeries,
    ) -> Result<(SignalEntry, Vec<Bar>), StageFailure> {
        let idx = daily
            .bars
            .iter()
            .position(|b| b.date() == date)
            .ok_or_else(|| StageFailure::new("date not in daily data"))?;
        if idx == 0 {
            return Err(StageFailure::new("no yesterday data"));
        }
        let yesterday_close = daily.bars[idx - 1].close;

        let session = self
            .port
            .get_intraday(ticker, date, self.config.intraday_interval)
            .bars;

        match SignalEvaluator::evaluate(ticker, self.config.signal_window, &session, yesterday_close)? {
            SignalOutcome::Detected(entry) => Ok((entry, session)),
            SignalOutcome::NotDetected { reason } => Err(StageFailure::new(reason)),
        }
    }

    fn exit_stage(
        &self,
        entry: &SignalEntry,
        session: &[Bar],
        date: NaiveDate,
        daily: &BarSeries,
    ) -> ExitOutcome {
        self.exit
            .intraday(entry.entry_price, entry.entry_time, session)
            .unwrap_or_else(|| {
                let day = daily.bars.iter().find(|b| b.date() == date);
                self.exit.daily(entry.entry_price, day)
            })
    }
}
