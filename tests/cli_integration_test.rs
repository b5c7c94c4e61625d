//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_strategy_config, build_backtest_config)
//! - Ticker resolution (resolve_tickers)
//! - Data backend selection with real INI files on disk
//! - Backtest, compare, screen and live-check pipelines with MockDataPort

mod common;

use common::*;
use std::fs;
use std::io::Write;
use svea::adapters::file_config_adapter::FileConfigAdapter;
use svea::cli;
use svea::domain::error::SveaError;
use svea::domain::exit::ExitReason;
use svea::domain::strategy::StrategyConfig;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[data]
backend = csv
csv_dir = /tmp/svea-data

[backtest]
start_date = 2024-01-01
end_date = 2024-12-31
tickers = VOLV-B.ST, abb.st, SAND.ST
workers = 2

[strategy]
name = Breakout with trailing stop
use_earnings_surprise_filter = false
use_trailing_stop = yes

[screening]
sma_period = 200
momentum_lookback_3m = 63
momentum_lookback_1y = 252

[signal]
window_start = 09:20
window_end = 10:00
intraday_interval = 60m

[exit]
session_close = 17:30

[logging]
level = warn
"#;

fn config(ini: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(ini).unwrap()
}

mod config_loading {
    use super::*;

    #[test]
    fn strategy_from_valid_ini() {
        let s = cli::build_strategy_config(&config(VALID_INI)).unwrap();
        assert_eq!(s.name, "Breakout with trailing stop");
        assert!(s.use_trailing_stop);
        assert!(!s.use_earnings_surprise_filter);
        assert_eq!(s.sma_period, 200);
        assert_eq!(s.lookback_3m, 63);
        assert_eq!(s.lookback_1y, 252);
        assert_eq!(s.intraday_interval, Interval::Hour);
        assert_eq!(s.signal_window.to_string(), "09:20-10:00");
    }

    #[test]
    fn strategy_defaults_from_empty_ini() {
        let s = cli::build_strategy_config(&config("[strategy]\n")).unwrap();
        let d = StrategyConfig::default();
        assert_eq!(s.sma_period, d.sma_period);
        assert_eq!(s.signal_window, d.signal_window);
        assert_eq!(s.session_close, d.session_close);
        assert!(!s.use_trailing_stop);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = cli::build_strategy_config(&config(
            "[signal]\nwindow_start = 10:00\nwindow_end = 09:20\n",
        ))
        .unwrap_err();
        assert!(matches!(err, SveaError::ConfigInvalid { .. }), "{:?}", err);
    }

    #[test]
    fn non_positive_lookback_is_rejected() {
        let err = cli::build_strategy_config(&config("[screening]\nsma_period = 0\n")).unwrap_err();
        assert!(err.to_string().contains("sma_period"), "{}", err);
    }

    #[test]
    fn backtest_from_valid_ini() {
        let bt = cli::build_backtest_config(&config(VALID_INI), None).unwrap();
        assert_eq!(bt.start_date, date(2024, 1, 1));
        assert_eq!(bt.end_date, date(2024, 12, 31));
        assert_eq!(bt.tickers, vec!["VOLV-B.ST", "ABB.ST", "SAND.ST"]);
        assert_eq!(bt.workers, 2);
    }

    #[test]
    fn backtest_override_fills_missing_tickers() {
        let ini = "[backtest]\nstart_date = 2024-01-01\nend_date = 2024-06-30\n";
        let bt = cli::build_backtest_config(&config(ini), Some("ERIC-B.ST")).unwrap();
        assert_eq!(bt.tickers, vec!["ERIC-B.ST"]);
        assert_eq!(bt.workers, 1);

        let err = cli::build_backtest_config(&config(ini), None).unwrap_err();
        assert!(matches!(err, SveaError::ConfigMissing { .. }));
    }

    #[test]
    fn backtest_rejects_reversed_dates() {
        let ini = "[backtest]\nstart_date = 2024-12-31\nend_date = 2024-01-01\ntickers = A\n";
        assert!(cli::build_backtest_config(&config(ini), None).is_err());
    }

    #[test]
    fn backtest_rejects_bad_date_format() {
        let ini = "[backtest]\nstart_date = 01/01/2024\nend_date = 2024-12-31\ntickers = A\n";
        let err = cli::build_backtest_config(&config(ini), None).unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"), "{}", err);
    }

    #[test]
    fn override_replaces_configured_tickers() {
        let tickers = cli::resolve_tickers(Some("hm-b.st,ERIC-B.ST"), &config(VALID_INI)).unwrap();
        assert_eq!(tickers, vec!["HM-B.ST", "ERIC-B.ST"]);
    }

    #[test]
    fn duplicate_tickers_are_rejected() {
        let err = cli::resolve_tickers(Some("ABB.ST,abb.st"), &config(VALID_INI)).unwrap_err();
        assert!(err.to_string().contains("ABB.ST"), "{}", err);
    }

    #[test]
    fn env_override_wins_over_file() {
        let adapter = config(VALID_INI).with_overrides([(
            "SVEA_STRATEGY_USE_TRAILING_STOP".to_string(),
            "false".to_string(),
        )]);
        let s = cli::build_strategy_config(&adapter).unwrap();
        assert!(!s.use_trailing_stop);
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let err = cli::load_config(std::path::Path::new("/nonexistent/svea.ini")).unwrap_err();
        assert!(matches!(err, SveaError::ConfigParse { .. }), "{:?}", err);
    }

    #[test]
    fn load_config_reads_disk() {
        let file = write_temp_ini(VALID_INI);
        let adapter = cli::load_config(file.path()).unwrap();
        let bt = cli::build_backtest_config(&adapter, None).unwrap();
        assert_eq!(bt.tickers.len(), 3);
    }
}

mod data_backend {
    use super::*;

    #[test]
    fn csv_backend_opens_existing_directory() {
        let dir = TempDir::new().unwrap();
        let ini = format!("[data]\nbackend = csv\ncsv_dir = {}\n", dir.path().display());
        assert!(cli::open_data_port(&config(&ini)).is_ok());
    }

    #[test]
    fn csv_backend_missing_directory_is_io_error() {
        let ini = "[data]\nbackend = csv\ncsv_dir = /nonexistent/svea-data\n";
        let err = cli::open_data_port(&config(ini)).err().unwrap();
        assert!(matches!(err, SveaError::Io(_)), "{:?}", err);
    }

    #[test]
    fn csv_backend_requires_directory() {
        let err = cli::open_data_port(&config("[data]\nbackend = csv\n")).err().unwrap();
        assert!(matches!(err, SveaError::ConfigMissing { .. }), "{:?}", err);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = cli::open_data_port(&config("[data]\nbackend = parquet\n")).err().unwrap();
        assert!(matches!(err, SveaError::ConfigInvalid { .. }), "{:?}", err);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_backend_opens_file() {
        let dir = TempDir::new().unwrap();
        let ini = format!(
            "[data]\nbackend = sqlite\n\n[sqlite]\npath = {}\npool_size = 2\n",
            dir.path().join("svea.db").display()
        );
        assert!(cli::open_data_port(&config(&ini)).is_ok());
    }
}

mod pipelines {
    use super::*;

    const Y: f64 = 150.0;

    fn event_day() -> chrono::NaiveDate {
        date(2024, 4, 25)
    }

    fn port() -> MockDataPort {
        let day = event_day();
        let after = [
            (1.024 * 1.06, 1.024 * 1.04, 1.024 * 1.05),
            (1.024 * 1.05, 1.024 * 1.035, 1.024 * 1.04),
        ];
        MockDataPort::new()
            .with_daily("VOLV-B.ST", uptrend_with_event_day(day))
            .with_hourly("VOLV-B.ST", session(day, Y, &after))
            .with_event("VOLV-B.ST", day, Some(3.1), Some(3.4))
            .with_daily("SAND.ST", daily_ramp(day, 300, 150.0, 50.0))
            .with_event("SAND.ST", day, Some(1.0), Some(1.1))
            .with_error("BROKEN.ST", "HTTP 503")
    }

    #[test]
    fn backtest_writes_trade_log_and_summary() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("reports").join("trades.csv");
        let strategy = StrategyConfig {
            use_trailing_stop: true,
            ..StrategyConfig::default()
        };
        let bt = backtest_config(
            &["VOLV-B.ST", "SAND.ST", "BROKEN.ST"],
            date(2024, 1, 1),
            date(2024, 12, 31),
        );

        let result = cli::run_backtest_pipeline(&port(), &strategy, &bt, &output).unwrap();
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.metrics.trades_executed, 1);

        let log = fs::read_to_string(&output).unwrap();
        assert_eq!(log.lines().count(), 3);
        assert!(log.contains("trailing_stop"));
        assert!(dir.path().join("reports/trades_summary.csv").exists());
        assert!(dir.path().join("reports/trades_tickers.csv").exists());
    }

    #[test]
    fn simulate_single_event() {
        let strategy = StrategyConfig::default();
        let trade = cli::run_simulate_pipeline(&port(), &strategy, "VOLV-B.ST", event_day()).unwrap();
        assert!(trade.is_executed());
        assert_eq!(trade.exit_reason, Some(ExitReason::EndOfDay));
    }

    #[test]
    fn compare_writes_every_variant() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cmp.csv");
        let bt = backtest_config(&["VOLV-B.ST", "SAND.ST"], date(2024, 1, 1), date(2024, 12, 31));

        let results =
            cli::run_compare_pipeline(&port(), &StrategyConfig::default(), &bt, &output).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|v| v.result.metrics.trades_executed == 1));
        assert_eq!(
            results[0].result.trades[0].exit_reason,
            Some(ExitReason::EndOfDay)
        );
        assert_eq!(
            results[2].result.trades[0].exit_reason,
            Some(ExitReason::TrailingStop)
        );

        let table = fs::read_to_string(dir.path().join("cmp_comparison.csv")).unwrap();
        assert_eq!(table.lines().count(), 5);
    }

    #[test]
    fn screen_keeps_only_uptrending_reporters() {
        let tickers: Vec<String> = ["VOLV-B.ST", "SAND.ST", "ABB.ST"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let watchlist =
            cli::run_screen_pipeline(&port(), &StrategyConfig::default(), event_day(), &tickers).unwrap();
        assert_eq!(watchlist.len(), 1);
        assert_eq!(watchlist[0].ticker, "VOLV-B.ST");
        assert_eq!(watchlist[0].eps_estimate, Some(3.1));
        assert!(watchlist[0].trend_score >= 70);
    }

    #[test]
    fn live_check_inside_window() {
        let day = event_day();
        let bars = vec![
            bar_at(at(day, 9, 0), Y * 1.002, Y * 1.012, Y * 1.000, Y * 1.010),
            bar_at(at(day, 9, 30), Y * 1.010, Y * 1.032, Y * 1.009, Y * 1.030),
        ];
        let port = MockDataPort::new()
            .with_daily("VOLV-B.ST", uptrend_with_event_day(day))
            .with_hourly("VOLV-B.ST", bars)
            .at(at(day, 9, 45));
        let tickers = vec!["VOLV-B.ST".to_string(), "BROKEN.ST".to_string()];

        let records = cli::run_check_pipeline(&port, &StrategyConfig::default(), &tickers);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.ticker, "VOLV-B.ST");
        assert_eq!(r.signal_time, at(day, 9, 45));
        assert!(r.pct_from_yesterday > 2.0);
        assert!((0.0..=1.0).contains(&r.confidence));

        let mut out = Vec::new();
        cli::write_signals(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("ticker,signal_time,entry_price,open_price,vwap"));
        assert!(lines.next().unwrap().starts_with("VOLV-B.ST,2024-04-25 09:45:00,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn no_signals_write_nothing() {
        let mut out = Vec::new();
        cli::write_signals(&[], &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn live_check_outside_window_is_silent() {
        let day = event_day();
        let bars = vec![bar_at(at(day, 9, 0), Y * 1.002, Y * 1.040, Y * 1.000, Y * 1.035)];
        let port = MockDataPort::new()
            .with_daily("VOLV-B.ST", uptrend_with_event_day(day))
            .with_hourly("VOLV-B.ST", bars)
            .at(at(day, 11, 0));
        let records =
            cli::run_check_pipeline(&port, &StrategyConfig::default(), &["VOLV-B.ST".to_string()]);
        assert!(records.is_empty());
    }
}
