//! Data quality scoring and OHLCV sanity checks.
//!
//! Score starts at 100 and loses points for non-finite values, large
//! close-to-close jumps, zero-volume bars and stale data.

use crate::domain::bar::{Bar, Interval};

pub const STALENESS_THRESHOLD_SECS: i64 = 120;

const LARGE_GAP_FRACTION: f64 = 0.20;

/// Quality score in [0, 100].
pub fn quality_score(bars: &[Bar], data_age_seconds: Option<i64>) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }

    let mut score = 100.0;

    let fields = bars.len() * 5;
    let non_finite: usize = bars
        .iter()
        .map(|b| {
            [b.open, b.high, b.low, b.close, b.volume]
                .iter()
                .filter(|v| !v.is_finite())
                .count()
        })
        .sum();
    if non_finite > 0 {
        let missing_pct = non_finite as f64 / fields as f64 * 100.0;
        score -= (missing_pct * 2.0).min(30.0);
    }

    if bars.len() > 1 {
        let large_gaps = bars
            .windows(2)
            .filter(|w| {
                let prev = w[0].close;
                prev != 0.0 && ((w[1].close - prev) / prev).abs() > LARGE_GAP_FRACTION
            })
            .count();
        if large_gaps > 0 {
            score -= (large_gaps as f64 * 10.0).min(20.0);
        }

        let zero_volume = bars.iter().filter(|b| b.volume == 0.0).count();
        if zero_volume > 0 {
            score -= (zero_volume as f64 * 5.0).min(15.0);
        }
    }

    if let Some(age) = data_age_seconds {
        if age > STALENESS_THRESHOLD_SECS {
            score -= ((age - STALENESS_THRESHOLD_SECS) as f64 / 60.0).min(20.0);
        }
    }

    score.clamp(0.0, 100.0)
}

/// OHLC relationship and sign checks. Empty result means the bars are valid.
pub fn validate_ohlcv(bars: &[Bar]) -> Vec<String> {
    let mut issues = Vec::new();

    let count = |pred: &dyn Fn(&Bar) -> bool| bars.iter().filter(|b| pred(b)).count();

    let high_below_low = count(&|b| b.high < b.low);
    if high_below_low > 0 {
        issues.push(format!("{} rows where high < low", high_below_low));
    }
    let high_below_close = count(&|b| b.high < b.close);
    if high_below_close > 0 {
        issues.push(format!("{} rows where high < close", high_below_close));
    }
    let low_above_close = count(&|b| b.low > b.close);
    if low_above_close > 0 {
        issues.push(format!("{} rows where low > close", low_above_close));
    }
    let negative_prices = count(&|b| b.open < 0.0 || b.high < 0.0 || b.low < 0.0 || b.close < 0.0);
    if negative_prices > 0 {
        issues.push(format!("{} rows with negative prices", negative_prices));
    }
    let negative_volume = count(&|b| b.volume < 0.0);
    if negative_volume > 0 {
        issues.push(format!("{} rows with negative volume", negative_volume));
    }

    issues
}

/// Time gaps larger than twice the interval. Intraday series are only
/// compared within a session; daily series tolerate weekends.
pub fn detect_gaps(bars: &[Bar], interval: Interval) -> Vec<String> {
    let tolerance = match interval {
        Interval::Day => 4 * Interval::Day.seconds(),
        other => 2 * other.seconds(),
    };

    bars.windows(2)
        .filter(|w| !interval.is_intraday() || w[0].date() == w[1].date())
        .filter_map(|w| {
            let delta = (w[1].timestamp - w[0].timestamp).num_seconds();
            (delta > tolerance).then(|| {
                format!(
                    "gap from {} to {} ({}s)",
                    w[0].timestamp, w[1].timestamp, delta
                )
            })
        })
        .collect()
}
