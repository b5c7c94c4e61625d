//! Strategy configuration.
//!
//! Built once at startup and passed by reference into every component.
//! Percent thresholds are policy constants and live next to the stage that
//! uses them; only lookbacks, the signal window and the mode flags vary.

use crate::domain::bar::Interval;
use crate::domain::error::SveaError;
use chrono::NaiveTime;
use std::fmt;

pub const DEFAULT_SMA_PERIOD: usize = 200;
pub const DEFAULT_LOOKBACK_3M: usize = 63;
pub const DEFAULT_LOOKBACK_1Y: usize = 252;

/// Inclusive clock window in which entry conditions are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SignalWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SveaError> {
        if start >= end {
            return Err(SveaError::invalid(
                "signal",
                "window_start",
                "window_start must be before window_end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

impl Default for SignalWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 20, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for SignalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub sma_period: usize,
    pub lookback_3m: usize,
    pub lookback_1y: usize,
    pub signal_window: SignalWindow,
    pub intraday_interval: Interval,
    /// Exit time stamped on daily-fallback exits.
    pub session_close: NaiveTime,
    pub use_earnings_surprise_filter: bool,
    pub use_trailing_stop: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            name: "Earnings breakout".to_string(),
            sma_period: DEFAULT_SMA_PERIOD,
            lookback_3m: DEFAULT_LOOKBACK_3M,
            lookback_1y: DEFAULT_LOOKBACK_1Y,
            signal_window: SignalWindow::default(),
            intraday_interval: Interval::Hour,
            session_close: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or(NaiveTime::MIN),
            use_earnings_surprise_filter: false,
            use_trailing_stop: false,
        }
    }
}

impl StrategyConfig {
    /// Reject settings that indicate a mis-specified experiment.
    pub fn validate(&self) -> Result<(), SveaError> {
        for (key, value) in [
            ("sma_period", self.sma_period),
            ("momentum_lookback_3m", self.lookback_3m),
            ("momentum_lookback_1y", self.lookback_1y),
        ] {
            if value == 0 {
                return Err(SveaError::invalid("screening", key, "lookback must be positive"));
            }
        }
        if self.lookback_3m > self.lookback_1y {
            return Err(SveaError::invalid(
                "screening",
                "momentum_lookback_3m",
                "3-month lookback cannot exceed 1-year lookback",
            ));
        }
        if !self.intraday_interval.is_intraday() {
            return Err(SveaError::invalid(
                "signal",
                "intraday_interval",
                "signal detection needs an intraday interval",
            ));
        }
        SignalWindow::new(self.signal_window.start, self.signal_window.end)?;
        Ok(())
    }

    /// Daily bars needed before the evaluation date.
    pub fn required_history(&self) -> usize {
        self.sma_period.max(self.lookback_1y).max(self.lookback_3m)
    }

    /// Calendar days to request so that `required_history` trading days are
    /// covered, with slack for holidays.
    pub fn history_calendar_days(&self) -> i64 {
        (self.required_history() as i64 * 365) / 252 + 30
    }

    /// The four variants compared side by side.
    pub fn variants(&self) -> Vec<StrategyConfig> {
        [
            ("Baseline", false, false),
            ("Earnings surprise filter", true, false),
            ("Trailing stop", false, true),
            ("Earnings filter + trailing stop", true, true),
        ]
        .into_iter()
        .map(|(name, earnings, trailing)| StrategyConfig {
            name: name.to_string(),
            use_earnings_surprise_filter: earnings,
            use_trailing_stop: trailing,
            ..self.clone()
        })
        .collect()
    }
}
