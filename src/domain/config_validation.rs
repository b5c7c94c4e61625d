//! Configuration validation.
//!
//! Every field is checked before a run starts; a bad value aborts the run
//! with the section and key that caused it.

use crate::domain::bar::Interval;
use crate::domain::error::SveaError;
use crate::domain::tickers::parse_tickers;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SveaError> {
    validate_dates(config)?;
    validate_tickers(config)?;
    validate_workers(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let backend = config
        .get_string("data", "backend")
        .unwrap_or_else(|| "csv".to_string());
    match backend.trim().to_lowercase().as_str() {
        "csv" => require(config, "data", "csv_dir").map(|_| ()),
        "sqlite" => {
            require(config, "sqlite", "path")?;
            if config.get_int("sqlite", "pool_size", 4) < 1 {
                return Err(SveaError::invalid("sqlite", "pool_size", "pool_size must be at least 1"));
            }
            Ok(())
        }
        other => Err(SveaError::invalid(
            "data",
            "backend",
            format!("unknown backend '{}', expected csv or sqlite", other),
        )),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SveaError> {
    validate_lookbacks(config)?;
    validate_window(config)?;
    validate_interval(config)?;
    parse_time(config, "exit", "session_close", "17:30")?;
    validate_log_level(config)?;
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SveaError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SveaError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    if start_date > end_date {
        return Err(SveaError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SveaError> {
    match value {
        None => Err(SveaError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SveaError::invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// `HH:MM` value, or `default` when the key is absent.
pub fn parse_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<NaiveTime, SveaError> {
    let raw = config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| SveaError::invalid(section, key, format!("invalid time '{}', expected HH:MM", raw)))
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let raw = require(config, "backtest", "tickers")?;
    parse_tickers(&raw).map_err(|e| SveaError::invalid("backtest", "tickers", e.to_string()))?;
    Ok(())
}

fn validate_workers(config: &dyn ConfigPort) -> Result<(), SveaError> {
    if config.get_int("backtest", "workers", 1) < 1 {
        return Err(SveaError::invalid("backtest", "workers", "workers must be at least 1"));
    }
    Ok(())
}

fn validate_lookbacks(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let mut values = Vec::new();
    for (key, default) in [
        ("sma_period", 200),
        ("momentum_lookback_3m", 63),
        ("momentum_lookback_1y", 252),
    ] {
        let value = config.get_int("screening", key, default);
        if value < 1 {
            return Err(SveaError::invalid(
                "screening",
                key,
                format!("{} must be positive", key),
            ));
        }
        values.push(value);
    }
    if values[1] > values[2] {
        return Err(SveaError::invalid(
            "screening",
            "momentum_lookback_3m",
            "3-month lookback cannot exceed 1-year lookback",
        ));
    }
    Ok(())
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let start = parse_time(config, "signal", "window_start", "09:20")?;
    let end = parse_time(config, "signal", "window_end", "10:00")?;
    if start >= end {
        return Err(SveaError::invalid(
            "signal",
            "window_start",
            "window_start must be before window_end",
        ));
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort) -> Result<(), SveaError> {
    let raw = config
        .get_string("signal", "intraday_interval")
        .unwrap_or_else(|| "60m".to_string());
    let interval: Interval = raw
        .parse()
        .map_err(|e: String| SveaError::invalid("signal", "intraday_interval", e))?;
    if !interval.is_intraday() {
        return Err(SveaError::invalid(
            "signal",
            "intraday_interval",
            "signal detection needs an intraday interval",
        ));
    }
    Ok(())
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), SveaError> {
    match config.get_string("logging", "level") {
        Some(level) if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) => {
            Err(SveaError::invalid(
                "logging",
                "level",
                format!("unknown level '{}'", level),
            ))
        }
        _ => Ok(()),
    }
}
