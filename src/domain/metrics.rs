//! Performance statistics over a set of simulated trades.
//!
//! Pure reduction: the same trades always give the same metrics, and an
//! empty input gives all zeros. A trade counts as a win when pnl > 0;
//! flat trades count as losses.

use crate::domain::exit::ExitReason;
use crate::domain::trade::Trade;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Executed trades needed before an edge verdict is meaningful.
pub const MIN_SAMPLE_TRADES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_events_tested: usize,
    pub passed_filter: usize,
    pub signal_detected: usize,
    pub trades_executed: usize,
    pub filter_pass_rate: f64,
    pub signal_rate: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub avg_win: f64,
    /// Mean pnl of losing trades (zero or negative).
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Most negative pnl among losing trades.
    pub largest_loss: f64,
    pub avg_return_pct: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub exits_eod: usize,
    pub exits_stop_loss: usize,
    pub exits_trailing_stop: usize,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Gross profit over gross loss. Infinite when nothing was lost but
/// something was won; zero when both are zero.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|&&p| p <= 0.0).sum::<f64>().abs();
    if gross_loss == 0.0 {
        if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        gross_profit / gross_loss
    }
}

impl Metrics {
    pub fn compute(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let passed_filter = trades.iter().filter(|t| t.passed_filter).count();
        let signal_detected = trades.iter().filter(|t| t.signal_detected).count();
        let executed: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.signal_detected && t.pnl.is_some())
            .collect();

        let pnl = |t: &&Trade| t.pnl.unwrap_or_default();
        let pnl_pct = |t: &&Trade| t.pnl_pct.unwrap_or_default();

        let (wins, losses): (Vec<&Trade>, Vec<&Trade>) =
            executed.iter().copied().partition(|t| pnl(t) > 0.0);

        let all_pnl: Vec<f64> = executed.iter().map(pnl).collect();
        let win_pnl: Vec<f64> = wins.iter().map(pnl).collect();
        let loss_pnl: Vec<f64> = losses.iter().map(pnl).collect();

        let exits = |reason: ExitReason| {
            executed
                .iter()
                .filter(|t| t.exit_reason == Some(reason))
                .count()
        };

        let total_pnl: f64 = all_pnl.iter().sum();
        let avg_pnl = mean(&all_pnl);

        Metrics {
            total_events_tested: trades.len(),
            passed_filter,
            signal_detected,
            trades_executed: executed.len(),
            filter_pass_rate: pct(passed_filter, trades.len()),
            signal_rate: pct(signal_detected, passed_filter),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: pct(wins.len(), executed.len()),
            total_pnl,
            avg_pnl,
            avg_win: mean(&win_pnl),
            avg_loss: mean(&loss_pnl),
            largest_win: win_pnl.iter().copied().fold(0.0, f64::max),
            largest_loss: loss_pnl.iter().copied().fold(0.0, f64::min),
            avg_return_pct: mean(&executed.iter().map(pnl_pct).collect::<Vec<_>>()),
            avg_win_pct: mean(&wins.iter().map(pnl_pct).collect::<Vec<_>>()),
            avg_loss_pct: mean(&losses.iter().map(pnl_pct).collect::<Vec<_>>()),
            profit_factor: profit_factor(&all_pnl),
            expectancy: avg_pnl,
            exits_eod: exits(ExitReason::EndOfDay),
            exits_stop_loss: exits(ExitReason::StopLoss),
            exits_trailing_stop: exits(ExitReason::TrailingStop),
        }
    }

    pub fn assess(&self) -> Verdict {
        if self.trades_executed == 0 {
            Verdict::NoTrades
        } else if self.trades_executed < MIN_SAMPLE_TRADES {
            Verdict::InsufficientSample
        } else if self.win_rate >= 50.0 && self.profit_factor >= 1.2 && self.expectancy > 0.0 {
            Verdict::PositiveEdge
        } else if self.win_rate >= 45.0 && self.profit_factor >= 1.0 {
            Verdict::MarginalEdge
        } else {
            Verdict::NoEdge
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NoTrades,
    InsufficientSample,
    PositiveEdge,
    MarginalEdge,
    NoEdge,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::NoTrades => "no trades executed",
            Verdict::InsufficientSample => "insufficient sample size",
            Verdict::PositiveEdge => "positive edge",
            Verdict::MarginalEdge => "marginal edge",
            Verdict::NoEdge => "no edge",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub events: usize,
    pub trades: usize,
    pub wins: usize,
    pub total_pnl: f64,
    pub avg_return_pct: f64,
}

/// One summary per ticker, in order of first appearance.
pub fn per_ticker(trades: &[Trade]) -> Vec<TickerSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Trade>> = HashMap::new();
    for t in trades {
        groups
            .entry(t.ticker.as_str())
            .or_insert_with(|| {
                order.push(t.ticker.as_str());
                Vec::new()
            })
            .push(t);
    }

    order
        .into_iter()
        .map(|ticker| {
            let group = &groups[ticker];
            let executed: Vec<&&Trade> = group.iter().filter(|t| t.is_executed()).collect();
            TickerSummary {
                ticker: ticker.to_string(),
                events: group.len(),
                trades: executed.len(),
                wins: executed
                    .iter()
                    .filter(|t| t.pnl.is_some_and(|p| p > 0.0))
                    .count(),
                total_pnl: executed.iter().filter_map(|t| t.pnl).sum(),
                avg_return_pct: mean(&executed.iter().filter_map(|t| t.pnl_pct).collect::<Vec<_>>()),
            }
        })
        .collect()
}
