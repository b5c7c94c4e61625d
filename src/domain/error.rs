//! Domain error types.
//!
//! Data errors (`DataUnavailable`, `InsufficientHistory`, `MalformedData`,
//! `UpstreamFetch`) never cross a ticker boundary during a backtest; they end
//! up as a trade's notes or a skipped-ticker entry. Configuration errors abort
//! the run.

#[derive(Debug, thiserror::Error)]
pub enum SveaError {
    #[error("no data for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("insufficient history for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("malformed data for {ticker}: {reason}")]
    MalformedData { ticker: String, reason: String },

    #[error("fetch failed for {ticker}: {reason}")]
    UpstreamFetch { ticker: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl SveaError {
    pub fn no_data(ticker: &str, reason: impl Into<String>) -> Self {
        SveaError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(ticker: &str, reason: impl Into<String>) -> Self {
        SveaError::MalformedData {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SveaError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by noisy or missing market data rather than a
    /// mis-specified run.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SveaError::DataUnavailable { .. }
                | SveaError::InsufficientHistory { .. }
                | SveaError::MalformedData { .. }
                | SveaError::UpstreamFetch { .. }
        )
    }
}

impl From<&SveaError> for std::process::ExitCode {
    fn from(err: &SveaError) -> Self {
        let code: u8 = match err {
            SveaError::Io(_) | SveaError::Csv(_) => 1,
            SveaError::ConfigParse { .. }
            | SveaError::ConfigMissing { .. }
            | SveaError::ConfigInvalid { .. } => 2,
            SveaError::Database { .. } | SveaError::DatabaseQuery { .. } => 3,
            SveaError::UpstreamFetch { .. } => 4,
            SveaError::DataUnavailable { .. }
            | SveaError::InsufficientHistory { .. }
            | SveaError::MalformedData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
