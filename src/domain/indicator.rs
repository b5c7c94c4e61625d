//! Price indicators used by the screening and signal stages.
//!
//! - `sma`: simple moving average of the last n closes
//! - `VwapTracker`: cumulative intraday VWAP, fed bar by bar
//! - `pct_change`: percentage move from a reference price
//! - `trailing_mean_close`: mean close of the last n bars

use crate::domain::bar::Bar;

/// Mean of the last `period` closes. `None` when fewer bars are available.
pub fn sma(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
}

/// (current - reference) / reference * 100. Zero reference gives 0.
pub fn pct_change(current: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (current - reference) / reference * 100.0
}

/// Mean close over the last `n` bars, or over all bars when fewer exist.
pub fn trailing_mean_close(bars: &[Bar], n: usize) -> Option<f64> {
    if bars.is_empty() || n == 0 {
        return None;
    }
    let start = bars.len().saturating_sub(n);
    let window = &bars[start..];
    Some(window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64)
}

/// Running VWAP over typical price. Never reset within a session.
#[derive(Debug, Clone, Default)]
pub struct VwapTracker {
    cum_pv: f64,
    cum_volume: f64,
}

impl VwapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one bar and return the VWAP including it. Bars with non-finite
    /// price or volume are ignored.
    pub fn push(&mut self, bar: &Bar) -> Option<f64> {
        if bar.is_finite() {
            self.cum_pv += bar.typical_price() * bar.volume;
            self.cum_volume += bar.volume;
        }
        self.value()
    }

    /// `None` until some volume has traded.
    pub fn value(&self) -> Option<f64> {
        if self.cum_volume > 0.0 {
            Some(self.cum_pv / self.cum_volume)
        } else {
            None
        }
    }
}
