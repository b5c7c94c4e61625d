//! Report generation port trait.

use crate::domain::backtest::{BacktestResult, VariantResult};
use crate::domain::error::SveaError;
use crate::domain::strategy::StrategyConfig;
use std::path::Path;

/// Port for writing backtest results somewhere durable.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        strategy: &StrategyConfig,
        output_path: &Path,
    ) -> Result<(), SveaError>;

    /// Default implementation: one `write` per variant, suffixing the file
    /// stem with the variant index.
    fn write_comparison(
        &self,
        results: &[VariantResult],
        output_path: &Path,
    ) -> Result<(), SveaError> {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trades".to_string());
        let ext = output_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());
        for (i, variant) in results.iter().enumerate() {
            let path = output_path.with_file_name(format!("{}_{}.{}", stem, i + 1, ext));
            self.write(&variant.result, &variant.strategy, &path)?;
        }
        Ok(())
    }
}
