//! Exit simulation: fixed stop, breakeven and trailing stop.
//!
//! The stop moves through `Armed -> Trailing -> Closed`. While armed it sits
//! at 97.5 % of entry. With trailing enabled, a +2 % high moves it to
//! breakeven and a +5 % high trails it 2 % under the session high. Each bar
//! updates the high first, then tests the low against the stop.

use crate::domain::bar::Bar;
use crate::domain::strategy::StrategyConfig;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

pub const INITIAL_STOP_FACTOR: f64 = 0.975;
pub const BREAKEVEN_TRIGGER_PCT: f64 = 2.0;
pub const TRAIL_TRIGGER_PCT: f64 = 5.0;
pub const TRAIL_FACTOR: f64 = 0.98;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    EndOfDay,
    StopLoss,
    TrailingStop,
    NoDataAvailable,
    Error,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::EndOfDay => "end_of_day",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::NoDataAvailable => "no_data_available",
            ExitReason::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Which data resolution produced the exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataQuality {
    #[serde(rename = "hourly_intraday")]
    Intraday,
    #[serde(rename = "daily_fallback")]
    DailyFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitOutcome {
    pub exit_price: f64,
    pub exit_time: NaiveTime,
    pub reason: ExitReason,
    pub data_quality: DataQuality,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopState {
    Armed,
    Trailing,
    Closed,
}

/// Stop-level state machine for one open position.
#[derive(Debug, Clone)]
pub struct StopTracker {
    entry_price: f64,
    initial_stop: f64,
    stop: f64,
    highest: f64,
    trailing: bool,
    state: StopState,
}

impl StopTracker {
    pub fn new(entry_price: f64, trailing: bool) -> Self {
        let initial_stop = entry_price * INITIAL_STOP_FACTOR;
        Self {
            entry_price,
            initial_stop,
            stop: initial_stop,
            highest: entry_price,
            trailing,
            state: StopState::Armed,
        }
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn initial_stop(&self) -> f64 {
        self.initial_stop
    }

    pub fn highest(&self) -> f64 {
        self.highest
    }

    pub fn state(&self) -> StopState {
        self.state
    }

    /// Count a high seen before the first tracked bar, such as the entry
    /// bar's own.
    pub fn observe_high(&mut self, high: f64) {
        if high > self.highest {
            self.highest = high;
        }
    }

    /// Feed one bar after entry. Returns the fill price and reason when the
    /// stop is breached; the tracker is then closed and ignores later bars.
    pub fn on_bar(&mut self, bar: &Bar) -> Option<(f64, ExitReason)> {
        if self.state == StopState::Closed {
            return None;
        }
        if bar.high > self.highest {
            self.highest = bar.high;
        }
        if self.trailing {
            let gain = (self.highest - self.entry_price) / self.entry_price * 100.0;
            if gain >= TRAIL_TRIGGER_PCT {
                self.stop = self.highest * TRAIL_FACTOR;
                self.state = StopState::Trailing;
            } else if gain >= BREAKEVEN_TRIGGER_PCT {
                self.stop = self.entry_price;
                self.state = StopState::Trailing;
            }
        }
        if bar.low <= self.stop {
            self.state = StopState::Closed;
            let reason = if self.trailing && self.stop > self.initial_stop {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            return Some((self.stop, reason));
        }
        None
    }
}

/// Runs the stop state machine over a session.
#[derive(Debug, Clone, Copy)]
pub struct ExitSimulator {
    trailing: bool,
    session_close: NaiveTime,
}

impl ExitSimulator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            trailing: config.use_trailing_stop,
            session_close: config.session_close,
        }
    }

    /// Walk the bars after the entry bar. `None` when `bars` is empty.
    pub fn intraday(
        &self,
        entry_price: f64,
        entry_time: NaiveDateTime,
        bars: &[Bar],
    ) -> Option<ExitOutcome> {
        let last = bars.last()?;
        let end_of_day = || {
            if last.close.is_finite() {
                ExitOutcome {
                    exit_price: last.close,
                    exit_time: last.time(),
                    reason: ExitReason::EndOfDay,
                    data_quality: DataQuality::Intraday,
                    note: None,
                }
            } else {
                warn!(time = %last.timestamp, "non-finite closing bar");
                ExitOutcome {
                    exit_price: entry_price,
                    exit_time: last.time(),
                    reason: ExitReason::Error,
                    data_quality: DataQuality::Intraday,
                    note: Some(format!("non-finite close at {}", last.timestamp)),
                }
            }
        };

        let Some(entry_idx) = bars.iter().position(|b| b.timestamp == entry_time) else {
            debug!(%entry_time, "entry bar not found, exiting at end of day");
            return Some(end_of_day());
        };

        let mut tracker = StopTracker::new(entry_price, self.trailing);
        tracker.observe_high(bars[entry_idx].high);
        for bar in &bars[entry_idx + 1..] {
            if let Some((price, reason)) = tracker.on_bar(bar) {
                debug!(price, %reason, time = %bar.timestamp, "stop hit");
                return Some(ExitOutcome {
                    exit_price: price,
                    exit_time: bar.time(),
                    reason,
                    data_quality: DataQuality::Intraday,
                    note: None,
                });
            }
        }
        Some(end_of_day())
    }

    /// Coarse exit from the day's daily bar, for callers that hold an entry
    /// without an intraday session. Only the fixed stop is checked.
    pub fn daily(&self, entry_price: f64, day: Option<&Bar>) -> ExitOutcome {
        let stop = entry_price * INITIAL_STOP_FACTOR;
        let (exit_price, reason) = match day {
            None => (entry_price, ExitReason::NoDataAvailable),
            Some(bar) if bar.low <= stop => (stop, ExitReason::StopLoss),
            Some(bar) if bar.close.is_finite() => (bar.close, ExitReason::EndOfDay),
            Some(_) => (entry_price, ExitReason::NoDataAvailable),
        };
        ExitOutcome {
            exit_price,
            exit_time: self.session_close,
            reason,
            data_quality: DataQuality::DailyFallback,
            note: None,
        }
    }
}
