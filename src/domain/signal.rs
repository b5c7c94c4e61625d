//! Intraday breakout detection.
//!
//! Two entry points share the same four conditions:
//!
//! - [`SignalEvaluator`] replays a session bar by bar (backtest). The "no
//!   falling knife" condition uses the same-bar proxy `close >= bar open`.
//! - [`check_live`] judges a single live snapshot, using the 5-minute
//!   average for that condition and attaching a confidence score.

use crate::domain::bar::Bar;
use crate::domain::error::SveaError;
use crate::domain::indicator::{self, VwapTracker};
use crate::domain::quality::STALENESS_THRESHOLD_SECS;
use crate::domain::strategy::SignalWindow;
use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::Serialize;
use tracing::{debug, info};

/// Minimum gain over yesterday's close, in percent. Strictly greater.
pub const MIN_GAIN_PCT: f64 = 2.0;

const BASE_CONFIDENCE: f64 = 0.5;
const MAX_DISTANCE_BONUS: f64 = 0.2;
const MAX_STALENESS_PENALTY: f64 = 0.3;
const STALENESS_PENALTY_SPAN_SECS: f64 = 600.0;

/// Bars the live check averages over for the falling-knife guard.
pub const AVG_WINDOW_BARS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEntry {
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub open_price: f64,
    pub vwap: f64,
    pub yesterday_close: f64,
    pub pct_from_yesterday: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Detected(SignalEntry),
    NotDetected { reason: String },
}

impl SignalOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, SignalOutcome::Detected(_))
    }
}

/// Causal detector for one session. Feed bars in timestamp order; the first
/// bar inside the window meeting every condition becomes the entry and later
/// bars are ignored.
#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    window: SignalWindow,
    yesterday_close: f64,
    vwap: VwapTracker,
    day_open: Option<f64>,
    entry: Option<SignalEntry>,
}

impl SignalEvaluator {
    pub fn new(ticker: &str, window: SignalWindow, yesterday_close: f64) -> Result<Self, SveaError> {
        if !yesterday_close.is_finite() || yesterday_close <= 0.0 {
            return Err(SveaError::malformed(
                ticker,
                format!("yesterday close must be positive, got {}", yesterday_close),
            ));
        }
        Ok(Self {
            window,
            yesterday_close,
            vwap: VwapTracker::new(),
            day_open: None,
            entry: None,
        })
    }

    pub fn entry(&self) -> Option<&SignalEntry> {
        self.entry.as_ref()
    }

    /// Absorb one bar. Returns the entry once detected.
    pub fn push(&mut self, bar: &Bar) -> Option<&SignalEntry> {
        if self.entry.is_some() {
            return self.entry.as_ref();
        }
        let day_open = *self.day_open.get_or_insert(bar.open);
        let vwap = self.vwap.push(bar);

        if !self.window.contains(bar.time()) {
            return None;
        }

        let close = bar.close;
        let above_vwap = vwap.is_some_and(|v| close > v);
        let above_open = close > day_open;
        let pct = indicator::pct_change(close, self.yesterday_close);
        let above_yesterday = pct > MIN_GAIN_PCT;
        let no_falling_knife = close >= bar.open;

        debug!(
            time = %bar.timestamp,
            close,
            vwap = ?vwap,
            above_vwap,
            above_open,
            pct_from_yesterday = pct,
            no_falling_knife,
            "signal window bar"
        );

        let qualifies = above_vwap && above_open && above_yesterday && no_falling_knife;
        if let Some(vwap) = vwap.filter(|_| qualifies) {
            self.entry = Some(SignalEntry {
                entry_price: close,
                entry_time: bar.timestamp,
                open_price: day_open,
                vwap,
                yesterday_close: self.yesterday_close,
                pct_from_yesterday: pct,
            });
        }
        self.entry.as_ref()
    }

    /// Replay a full session.
    pub fn evaluate(
        ticker: &str,
        window: SignalWindow,
        bars: &[Bar],
        yesterday_close: f64,
    ) -> Result<SignalOutcome, SveaError> {
        if bars.is_empty() {
            return Err(SveaError::no_data(ticker, "no intraday bars for date"));
        }
        let mut evaluator = Self::new(ticker, window, yesterday_close)?;
        for bar in bars {
            if evaluator.push(bar).is_some() {
                break;
            }
        }
        Ok(match evaluator.entry {
            Some(entry) => {
                info!(
                    ticker,
                    entry_price = entry.entry_price,
                    time = %entry.entry_time.format("%H:%M"),
                    "signal detected"
                );
                SignalOutcome::Detected(entry)
            }
            None => SignalOutcome::NotDetected {
                reason: format!("conditions not met during signal window ({})", window),
            },
        })
    }
}

/// Market state at one instant, as the live monitor sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub current_price: f64,
    pub open_price: f64,
    pub vwap: f64,
    pub yesterday_close: f64,
    pub avg_price_5min: Option<f64>,
    pub data_age_seconds: i64,
}

impl LiveSnapshot {
    /// Build a snapshot from today's bars so far. `None` without bars or
    /// traded volume.
    pub fn from_bars(bars: &[Bar], yesterday_close: f64, data_age_seconds: i64) -> Option<Self> {
        let first = bars.first()?;
        let last = bars.last()?;
        let mut tracker = VwapTracker::new();
        for bar in bars {
            tracker.push(bar);
        }
        Some(Self {
            current_price: last.close,
            open_price: first.open,
            vwap: tracker.value()?,
            yesterday_close,
            avg_price_5min: indicator::trailing_mean_close(bars, AVG_WINDOW_BARS),
            data_age_seconds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalConditions {
    pub above_vwap: bool,
    pub above_open: bool,
    pub above_yesterday_2pct: bool,
    pub above_5min_avg: bool,
    pub data_fresh: bool,
}

/// A live signal, handed as-is to whatever persists or alerts on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub ticker: String,
    pub signal_time: NaiveDateTime,
    pub entry_price: f64,
    pub open_price: f64,
    pub vwap: f64,
    pub yesterday_close: f64,
    pub avg_price_5min: Option<f64>,
    pub pct_from_yesterday: f64,
    pub vwap_distance_pct: f64,
    pub open_distance_pct: f64,
    pub data_age_seconds: i64,
    pub confidence: f64,
    pub conditions: SignalConditions,
}

/// Weekday and inside the window.
pub fn is_signal_window(window: &SignalWindow, at: NaiveDateTime) -> bool {
    !matches!(at.weekday(), Weekday::Sat | Weekday::Sun) && window.contains(at.time())
}

/// 0.5 base, up to +0.2 each for distance above VWAP and open, up to -0.3
/// for data older than the staleness threshold. Clamped to [0, 1].
pub fn confidence(vwap_distance_pct: f64, open_distance_pct: f64, data_age_seconds: i64) -> f64 {
    let mut c = BASE_CONFIDENCE;
    if vwap_distance_pct > 0.0 {
        c += (vwap_distance_pct / 2.0).min(MAX_DISTANCE_BONUS);
    }
    if open_distance_pct > 0.0 {
        c += (open_distance_pct / 2.0).min(MAX_DISTANCE_BONUS);
    }
    if data_age_seconds > STALENESS_THRESHOLD_SECS {
        let over = (data_age_seconds - STALENESS_THRESHOLD_SECS) as f64;
        c -= (over / STALENESS_PENALTY_SPAN_SECS).min(MAX_STALENESS_PENALTY);
    }
    c.clamp(0.0, 1.0)
}

fn usable(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Emit a record iff `at` is a weekday inside the window and all four
/// conditions hold. A missing 5-minute average counts as satisfied.
pub fn check_live(
    ticker: &str,
    snapshot: &LiveSnapshot,
    window: &SignalWindow,
    at: NaiveDateTime,
) -> Option<SignalRecord> {
    let s = snapshot;
    if ![s.current_price, s.open_price, s.vwap, s.yesterday_close]
        .into_iter()
        .all(usable)
    {
        debug!(ticker, "missing required data for signal check");
        return None;
    }
    if !is_signal_window(window, at) {
        return None;
    }

    let price = s.current_price;
    let pct = indicator::pct_change(price, s.yesterday_close);
    let conditions = SignalConditions {
        above_vwap: price > s.vwap,
        above_open: price > s.open_price,
        above_yesterday_2pct: pct > MIN_GAIN_PCT,
        above_5min_avg: s.avg_price_5min.is_none_or(|avg| price > avg),
        data_fresh: s.data_age_seconds < STALENESS_THRESHOLD_SECS,
    };
    if !(conditions.above_vwap
        && conditions.above_open
        && conditions.above_yesterday_2pct
        && conditions.above_5min_avg)
    {
        debug!(ticker, ?conditions, pct_from_yesterday = pct, "signal conditions not met");
        return None;
    }

    let vwap_distance_pct = indicator::pct_change(price, s.vwap);
    let open_distance_pct = indicator::pct_change(price, s.open_price);
    let confidence = confidence(vwap_distance_pct, open_distance_pct, s.data_age_seconds);

    info!(ticker, price, vwap = s.vwap, open = s.open_price, confidence, "live signal");

    Some(SignalRecord {
        ticker: ticker.to_string(),
        signal_time: at,
        entry_price: price,
        open_price: s.open_price,
        vwap: s.vwap,
        yesterday_close: s.yesterday_close,
        avg_price_5min: s.avg_price_5min,
        pct_from_yesterday: pct,
        vwap_distance_pct,
        open_distance_pct,
        data_age_seconds: s.data_age_seconds,
        confidence,
        conditions,
    })
}
