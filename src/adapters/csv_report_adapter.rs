//! CSV report adapter implementing ReportPort.
//!
//! For an output path `out/trades.csv` it writes the trade log there, plus
//! `out/trades_summary.csv` (one row of headline numbers) and
//! `out/trades_tickers.csv` (per-ticker breakdown).

use crate::domain::backtest::{BacktestResult, VariantResult};
use crate::domain::error::SveaError;
use crate::domain::metrics::{per_ticker, Verdict};
use crate::domain::strategy::StrategyConfig;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    strategy: &'a str,
    earnings_filter: bool,
    trailing_stop: bool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    tickers_tested: usize,
    tickers_skipped: usize,
    earnings_days_found: usize,
    passed_filter: usize,
    signal_detected: usize,
    trades_executed: usize,
    win_rate: f64,
    total_pnl: f64,
    avg_return_pct: f64,
    profit_factor: f64,
    expectancy: f64,
    verdict: Verdict,
}

impl<'a> SummaryRow<'a> {
    fn new(result: &BacktestResult, strategy: &'a StrategyConfig) -> Self {
        let m = &result.metrics;
        Self {
            strategy: &strategy.name,
            earnings_filter: strategy.use_earnings_surprise_filter,
            trailing_stop: strategy.use_trailing_stop,
            start_date: result.start_date,
            end_date: result.end_date,
            tickers_tested: result.tickers_tested,
            tickers_skipped: result.skipped.len(),
            earnings_days_found: result.earnings_days_found,
            passed_filter: m.passed_filter,
            signal_detected: m.signal_detected,
            trades_executed: m.trades_executed,
            win_rate: m.win_rate,
            total_pnl: m.total_pnl,
            avg_return_pct: m.avg_return_pct,
            profit_factor: m.profit_factor,
            expectancy: m.expectancy,
            verdict: m.assess(),
        }
    }
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trades".to_string());
        path.with_file_name(format!("{}_{}.csv", stem, suffix))
    }

    fn ensure_parent(path: &Path) -> Result<(), SveaError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), SveaError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &StrategyConfig,
        output_path: &Path,
    ) -> Result<(), SveaError> {
        Self::ensure_parent(output_path)?;
        Self::write_rows(output_path, &result.trades)?;
        Self::write_rows(
            &Self::sibling(output_path, "summary"),
            [SummaryRow::new(result, strategy)],
        )?;
        Self::write_rows(&Self::sibling(output_path, "tickers"), per_ticker(&result.trades))?;
        info!(path = %output_path.display(), trades = result.trades.len(), "wrote trade log");
        Ok(())
    }

    /// Per-variant trade logs plus one comparison table.
    fn write_comparison(&self, results: &[VariantResult], output_path: &Path) -> Result<(), SveaError> {
        Self::ensure_parent(output_path)?;
        for (i, variant) in results.iter().enumerate() {
            let path = Self::sibling(output_path, &(i + 1).to_string());
            self.write(&variant.result, &variant.strategy, &path)?;
        }
        let path = Self::sibling(output_path, "comparison");
        Self::write_rows(
            &path,
            results.iter().map(|v| SummaryRow::new(&v.result, &v.strategy)),
        )?;
        info!(path = %path.display(), variants = results.len(), "wrote comparison");
        Ok(())
    }
}
