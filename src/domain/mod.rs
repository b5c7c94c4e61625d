//! Core domain types and logic.

pub mod bar;
pub mod error;
pub mod indicator;
pub mod quality;
pub mod strategy;
pub mod earnings;
pub mod trend;
pub mod signal;
pub mod exit;
pub mod trade;
pub mod simulator;
pub mod backtest;
pub mod metrics;
pub mod screener;
pub mod tickers;
pub mod config_validation;

#[cfg(test)]
pub(crate) mod fixtures;
