//! Momentum pre-filter.
//!
//! A ticker passes when its last close is above the SMA and both the 3-month
//! and 1-year returns are positive. Passing tickers get a tiered score in
//! [60, 100]; everything else scores 0.

use crate::domain::bar::Bar;
use crate::domain::error::SveaError;
use crate::domain::indicator;
use crate::domain::strategy::StrategyConfig;
use tracing::{debug, warn};

const BASE_POINTS: u8 = 30;

/// Returns are fractions (0.12 = 12 %).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendAssessment {
    pub ticker: String,
    pub passes: bool,
    pub score: u8,
    pub current_price: Option<f64>,
    pub yesterday_close: Option<f64>,
    pub return_3m: Option<f64>,
    pub return_1y: Option<f64>,
    pub sma_200: Option<f64>,
    pub errors: Vec<String>,
}

impl TrendAssessment {
    fn failed(ticker: &str, err: SveaError) -> Self {
        Self {
            ticker: ticker.to_string(),
            errors: vec![err.to_string()],
            ..Default::default()
        }
    }

    /// Why the ticker did not pass, for trade notes.
    pub fn failure_reason(&self) -> String {
        if let Some(err) = self.errors.first() {
            return err.clone();
        }
        format!(
            "trend filter failed (score {}, price above SMA: {}, 3M: {}, 1Y: {})",
            self.score,
            matches!((self.current_price, self.sma_200), (Some(p), Some(s)) if p > s),
            fmt_return(self.return_3m),
            fmt_return(self.return_1y),
        )
    }
}

fn fmt_return(r: Option<f64>) -> String {
    r.map(|v| format!("{:.1}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn tier_3m(r: f64) -> u8 {
    if r > 0.10 {
        40
    } else if r > 0.05 {
        30
    } else {
        20
    }
}

fn tier_1y(r: f64) -> u8 {
    if r > 0.20 {
        30
    } else if r > 0.10 {
        20
    } else {
        10
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrendScorer {
    sma_period: usize,
    lookback_3m: usize,
    lookback_1y: usize,
}

impl TrendScorer {
    /// Fails when the config does not validate, so every lookback used
    /// for indexing is positive.
    pub fn new(config: &StrategyConfig) -> Result<Self, SveaError> {
        config.validate()?;
        Ok(Self {
            sma_period: config.sma_period,
            lookback_3m: config.lookback_3m,
            lookback_1y: config.lookback_1y,
        })
    }

    fn minimum_bars(&self) -> usize {
        self.sma_period.max(self.lookback_3m).max(self.lookback_1y)
    }

    /// Score `bars` (daily, oldest first). The caller decides the as-of date
    /// by slicing; nothing after the last bar is seen.
    pub fn evaluate(&self, ticker: &str, bars: &[Bar]) -> TrendAssessment {
        match self.try_evaluate(ticker, bars) {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(ticker, error = %e, "trend evaluation failed");
                TrendAssessment::failed(ticker, e)
            }
        }
    }

    fn try_evaluate(&self, ticker: &str, bars: &[Bar]) -> Result<TrendAssessment, SveaError> {
        let minimum = self.minimum_bars();
        if bars.len() < minimum {
            return Err(SveaError::InsufficientHistory {
                ticker: ticker.to_string(),
                bars: bars.len(),
                minimum,
            });
        }
        if let Some(bad) = bars[bars.len() - minimum..]
            .iter()
            .find(|b| !b.close.is_finite() || b.close <= 0.0)
        {
            return Err(SveaError::malformed(
                ticker,
                format!("invalid close on {}", bad.date()),
            ));
        }

        let n = bars.len();
        let current = bars[n - 1].close;
        let yesterday = if n >= 2 { bars[n - 2].close } else { current };
        let sma = indicator::sma(bars, self.sma_period).ok_or_else(|| {
            SveaError::InsufficientHistory {
                ticker: ticker.to_string(),
                bars: n,
                minimum: self.sma_period,
            }
        })?;
        let ref_3m = bars[n - self.lookback_3m].close;
        let ref_1y = bars[n - self.lookback_1y].close;
        let return_3m = (current - ref_3m) / ref_3m;
        let return_1y = (current - ref_1y) / ref_1y;

        let passes = current > sma && return_3m > 0.0 && return_1y > 0.0;
        let score = if passes {
            BASE_POINTS + tier_3m(return_3m) + tier_1y(return_1y)
        } else {
            0
        };

        debug!(
            ticker,
            passes,
            score,
            current,
            sma,
            return_3m,
            return_1y,
            "trend scored"
        );

        Ok(TrendAssessment {
            ticker: ticker.to_string(),
            passes,
            score,
            current_price: Some(current),
            yesterday_close: Some(yesterday),
            return_3m: Some(return_3m),
            return_1y: Some(return_1y),
            sma_200: Some(sma),
            errors: Vec::new(),
        })
    }
}
