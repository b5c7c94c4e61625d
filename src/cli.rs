//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{compare_variants, BacktestConfig, BacktestEngine, BacktestResult, VariantResult};
use crate::domain::bar::Interval;
use crate::domain::config_validation::{
    parse_date, parse_time, validate_backtest_config, validate_data_config, validate_strategy_config,
};
use crate::domain::error::SveaError;
use crate::domain::metrics::{per_ticker, Metrics};
use crate::domain::screener::{Screener, WatchlistEntry, WatchlistSummary};
use crate::domain::signal::{check_live, LiveSnapshot, SignalRecord};
use crate::domain::simulator::TradeSimulator;
use crate::domain::strategy::{SignalWindow, StrategyConfig};
use crate::domain::tickers::parse_tickers;
use crate::domain::trade::Trade;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "svea", about = "Earnings breakout screener and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every earnings event of the configured tickers
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Trade log destination (summary files are written alongside)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated tickers, overriding [backtest] tickers
        #[arg(long)]
        tickers: Option<String>,
        #[arg(short, long)]
        workers: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Simulate a single ticker on one earnings date
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        date: String,
    },
    /// Run the four strategy variants side by side
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Build the watchlist for a date (default: today)
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        tickers: Option<String>,
    },
    /// One pass of the live entry check over the watchlist tickers
    Check {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            tickers,
            workers,
            dry_run,
        } => run_backtest(&config, output.as_deref(), tickers.as_deref(), workers, dry_run),
        Command::Simulate { config, ticker, date } => run_simulate(&config, &ticker, &date),
        Command::Compare {
            config,
            output,
            tickers,
        } => run_compare(&config, output.as_deref(), tickers.as_deref()),
        Command::Screen {
            config,
            date,
            tickers,
        } => run_screen(&config, date.as_deref(), tickers.as_deref()),
        Command::Check { config, tickers } => run_check(&config, tickers.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config_level.unwrap_or("info")));
    // A second call within one process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SveaError> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| SveaError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(adapter.with_env_overrides())
}

fn load_and_init(path: &Path) -> Result<FileConfigAdapter, SveaError> {
    eprintln!("Loading config from {}", path.display());
    let config = load_config(path)?;
    init_logging(config.get_string("logging", "level").as_deref());
    Ok(config)
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, SveaError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| SveaError::invalid(section, key, format!("{} must be positive, got {}", key, value)))
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, SveaError> {
    let defaults = StrategyConfig::default();

    let signal_window = SignalWindow::new(
        parse_time(config, "signal", "window_start", "09:20")?,
        parse_time(config, "signal", "window_end", "10:00")?,
    )?;
    let intraday_interval: Interval = config
        .get_string("signal", "intraday_interval")
        .unwrap_or_else(|| defaults.intraday_interval.to_string())
        .parse()
        .map_err(|e: String| SveaError::invalid("signal", "intraday_interval", e))?;

    let strategy = StrategyConfig {
        name: config
            .get_string("strategy", "name")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.name),
        sma_period: positive(config, "screening", "sma_period", defaults.sma_period)?,
        lookback_3m: positive(config, "screening", "momentum_lookback_3m", defaults.lookback_3m)?,
        lookback_1y: positive(config, "screening", "momentum_lookback_1y", defaults.lookback_1y)?,
        signal_window,
        intraday_interval,
        session_close: parse_time(config, "exit", "session_close", "17:30")?,
        use_earnings_surprise_filter: config.get_bool("strategy", "use_earnings_surprise_filter", false),
        use_trailing_stop: config.get_bool("strategy", "use_trailing_stop", false),
    };
    strategy.validate()?;
    Ok(strategy)
}

/// Tickers from the override if given, else `[backtest] tickers`.
pub fn resolve_tickers(tickers_override: Option<&str>, config: &dyn ConfigPort) -> Result<Vec<String>, SveaError> {
    let (raw, section) = match tickers_override {
        Some(t) => (t.to_string(), "cli"),
        None => (
            config
                .get_string("backtest", "tickers")
                .ok_or_else(|| SveaError::ConfigMissing {
                    section: "backtest".into(),
                    key: "tickers".into(),
                })?,
            "backtest",
        ),
    };
    parse_tickers(&raw).map_err(|e| SveaError::invalid(section, "tickers", e.to_string()))
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    tickers_override: Option<&str>,
) -> Result<BacktestConfig, SveaError> {
    let bt = BacktestConfig {
        start_date: parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?,
        end_date: parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?,
        tickers: resolve_tickers(tickers_override, config)?,
        workers: positive(config, "backtest", "workers", 1)?,
    };
    bt.validate()?;
    Ok(bt)
}

/// Open the configured market data backend.
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, SveaError> {
    validate_data_config(config)?;
    let backend = config
        .get_string("data", "backend")
        .unwrap_or_else(|| "csv".to_string())
        .trim()
        .to_lowercase();

    let port: Box<dyn MarketDataPort> = if backend == "sqlite" {
        open_sqlite(config)?
    } else {
        let dir = config.get_string("data", "csv_dir").unwrap_or_default();
        Box::new(CsvAdapter::new(PathBuf::from(dir.trim())))
    };

    if !port.is_available() {
        return Err(SveaError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} data source is not available", backend),
        )));
    }
    Ok(port)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, SveaError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, SveaError> {
    Err(SveaError::invalid(
        "data",
        "backend",
        "sqlite feature is required for this backend",
    ))
}

fn run_backtest(
    config_path: &Path,
    output: Option<&Path>,
    tickers_override: Option<&str>,
    workers_override: Option<usize>,
    dry_run: bool,
) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_strategy_config(&config)?;
    let strategy = build_strategy_config(&config)?;
    let mut bt = build_backtest_config(&config, tickers_override)?;
    if let Some(w) = workers_override {
        bt.workers = w;
    }
    bt.validate()?;

    if dry_run {
        print_plan(&strategy, &bt);
        eprintln!("\nDry run complete: configuration is valid");
        return Ok(());
    }

    let port = open_data_port(&config)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("trades.csv"));
    run_backtest_pipeline(port.as_ref(), &strategy, &bt, &output)?;
    Ok(())
}

fn print_plan(strategy: &StrategyConfig, bt: &BacktestConfig) {
    eprintln!("\nStrategy: {}", strategy.name);
    eprintln!("  SMA period:        {}", strategy.sma_period);
    eprintln!(
        "  Momentum lookback: {} / {} days",
        strategy.lookback_3m, strategy.lookback_1y
    );
    eprintln!(
        "  Signal window:     {} ({} bars)",
        strategy.signal_window, strategy.intraday_interval
    );
    eprintln!("  Earnings filter:   {}", strategy.use_earnings_surprise_filter);
    eprintln!("  Trailing stop:     {}", strategy.use_trailing_stop);
    eprintln!("\nPeriod: {} to {}", bt.start_date, bt.end_date);
    eprintln!("Tickers ({}): {}", bt.tickers.len(), bt.tickers.join(", "));
    eprintln!("Workers: {}", bt.workers);
}

/// Backtest, print the summary and write the trade log.
pub fn run_backtest_pipeline(
    port: &dyn MarketDataPort,
    strategy: &StrategyConfig,
    bt: &BacktestConfig,
    output: &Path,
) -> Result<BacktestResult, SveaError> {
    eprintln!(
        "Running backtest: {} tickers, {} to {}",
        bt.tickers.len(),
        bt.start_date,
        bt.end_date
    );
    let result = BacktestEngine::new(port, strategy)?
        .with_workers(bt.workers)
        .run_backtest(&bt.tickers, bt.start_date, bt.end_date);

    print_summary(&strategy.name, &result);
    CsvReportAdapter::new().write(&result, strategy, output)?;
    eprintln!("\nTrade log written to: {}", output.display());
    Ok(result)
}

fn print_metrics(m: &Metrics) {
    eprintln!("Events tested:    {}", m.total_events_tested);
    eprintln!(
        "Passed filter:    {} ({:.1}%)",
        m.passed_filter, m.filter_pass_rate
    );
    eprintln!("Signals:          {} ({:.1}%)", m.signal_detected, m.signal_rate);
    eprintln!("Trades executed:  {}", m.trades_executed);
    if m.trades_executed == 0 {
        return;
    }
    eprintln!(
        "Win rate:         {:.1}% ({}W / {}L)",
        m.win_rate, m.winning_trades, m.losing_trades
    );
    eprintln!("Total P&L:        {:.2}", m.total_pnl);
    eprintln!("Avg return:       {:.2}%", m.avg_return_pct);
    eprintln!(
        "Avg win / loss:   {:.2}% / {:.2}%",
        m.avg_win_pct, m.avg_loss_pct
    );
    eprintln!("Profit factor:    {:.2}", m.profit_factor);
    eprintln!("Expectancy:       {:.2}", m.expectancy);
    eprintln!(
        "Exits:            {} EOD, {} stop, {} trailing",
        m.exits_eod, m.exits_stop_loss, m.exits_trailing_stop
    );
}

fn print_summary(name: &str, result: &BacktestResult) {
    eprintln!("\n=== {} ===", name);
    eprintln!(
        "Tickers tested:   {} ({} skipped)",
        result.tickers_tested,
        result.skipped.len()
    );
    eprintln!("Earnings days:    {}", result.earnings_days_found);
    print_metrics(&result.metrics);
    eprintln!("Assessment:       {}", result.metrics.assess());

    let summaries = per_ticker(&result.trades);
    if summaries.iter().any(|s| s.trades > 0) {
        eprintln!("\n=== Per-Ticker Summary ===");
        for s in summaries.iter().filter(|s| s.trades > 0) {
            eprintln!(
                "  {}:  {} events, {} trades, {} wins, {:+.2}",
                s.ticker, s.events, s.trades, s.wins, s.total_pnl
            );
        }
    }
    for skipped in &result.skipped {
        eprintln!("warning: skipped {} ({})", skipped.ticker, skipped.reason);
    }
}

fn run_simulate(config_path: &Path, ticker: &str, date: &str) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_strategy_config(&config)?;
    let strategy = build_strategy_config(&config)?;
    let date = parse_date(Some(date), "date")?;
    let port = open_data_port(&config)?;

    let trade = run_simulate_pipeline(port.as_ref(), &strategy, &ticker.trim().to_uppercase(), date)?;
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.serialize(&trade)?;
    writer.flush()?;
    Ok(())
}

pub fn run_simulate_pipeline(
    port: &dyn MarketDataPort,
    strategy: &StrategyConfig,
    ticker: &str,
    date: NaiveDate,
) -> Result<Trade, SveaError> {
    let trade = TradeSimulator::new(port, strategy)?.simulate_trade(ticker, date);

    eprintln!("\n{} on {}", ticker, date);
    eprintln!(
        "  Trend filter:  {} (score {})",
        if trade.passed_filter { "pass" } else { "fail" },
        trade.filter_score
    );
    if let Some(passed) = trade.passed_earnings_surprise {
        eprintln!("  Earnings:      {}", if passed { "beat" } else { "fail" });
    }
    if let (Some(entry), Some(time)) = (trade.entry_price, trade.entry_time) {
        eprintln!("  Entry:         {:.2} at {}", entry, time.format("%H:%M"));
    }
    if let (Some(exit), Some(reason)) = (trade.exit_price, trade.exit_reason) {
        eprintln!("  Exit:          {:.2} ({})", exit, reason);
    }
    if let (Some(pnl), Some(pct)) = (trade.pnl, trade.pnl_pct) {
        eprintln!("  P&L:           {:+.2} ({:+.2}%)", pnl, pct);
    }
    if let Some(notes) = &trade.notes {
        eprintln!("  Notes:         {}", notes);
    }
    Ok(trade)
}

fn run_compare(config_path: &Path, output: Option<&Path>, tickers_override: Option<&str>) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_strategy_config(&config)?;
    let base = build_strategy_config(&config)?;
    let bt = build_backtest_config(&config, tickers_override)?;
    let port = open_data_port(&config)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("comparison.csv"));
    run_compare_pipeline(port.as_ref(), &base, &bt, &output)?;
    Ok(())
}

pub fn run_compare_pipeline(
    port: &dyn MarketDataPort,
    base: &StrategyConfig,
    bt: &BacktestConfig,
    output: &Path,
) -> Result<Vec<VariantResult>, SveaError> {
    eprintln!(
        "Comparing {} variants over {} tickers, {} to {}",
        base.variants().len(),
        bt.tickers.len(),
        bt.start_date,
        bt.end_date
    );
    let results = compare_variants(port, base, bt)?;

    eprintln!(
        "\n{:<34} {:>7} {:>8} {:>10} {:>8}",
        "Variant", "Trades", "Win %", "Total P&L", "PF"
    );
    for v in &results {
        let m = &v.result.metrics;
        eprintln!(
            "{:<34} {:>7} {:>7.1}% {:>10.2} {:>8.2}",
            v.strategy.name, m.trades_executed, m.win_rate, m.total_pnl, m.profit_factor
        );
    }
    if let Some(best) = results
        .iter()
        .filter(|v| v.result.metrics.trades_executed > 0)
        .max_by(|a, b| a.result.metrics.total_pnl.total_cmp(&b.result.metrics.total_pnl))
    {
        eprintln!("\nBest total P&L: {}", best.strategy.name);
    }

    CsvReportAdapter::new().write_comparison(&results, output)?;
    eprintln!("Comparison written next to: {}", output.display());
    Ok(results)
}

fn run_screen(config_path: &Path, date: Option<&str>, tickers_override: Option<&str>) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_strategy_config(&config)?;
    let strategy = build_strategy_config(&config)?;
    let tickers = resolve_tickers(tickers_override, &config)?;
    let port = open_data_port(&config)?;
    let date = match date {
        Some(d) => parse_date(Some(d), "date")?,
        None => port.clock_now().date(),
    };

    let watchlist = run_screen_pipeline(port.as_ref(), &strategy, date, &tickers)?;
    let mut writer = csv::Writer::from_writer(io::stdout());
    for entry in &watchlist {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run_screen_pipeline(
    port: &dyn MarketDataPort,
    strategy: &StrategyConfig,
    date: NaiveDate,
    tickers: &[String],
) -> Result<Vec<WatchlistEntry>, SveaError> {
    let watchlist = Screener::new(port, strategy)?.run(date, tickers);
    let summary = WatchlistSummary::from_entries(&watchlist);

    eprintln!("\n=== Watchlist for {} ===", date);
    eprintln!("Candidates:       {}", tickers.len());
    eprintln!("Passed filter:    {}", summary.total);
    if let Some((lo, hi)) = summary.score_range {
        eprintln!("Avg score:        {:.1} (range {}-{})", summary.avg_score, lo, hi);
        eprintln!("Avg 3M return:    {:.1}%", summary.avg_return_3m * 100.0);
        eprintln!("Avg 1Y return:    {:.1}%", summary.avg_return_1y * 100.0);
    }
    if let Some(top) = &summary.top_ticker {
        eprintln!("Top ticker:       {}", top);
    }
    Ok(watchlist)
}

fn run_check(config_path: &Path, tickers_override: Option<&str>) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_strategy_config(&config)?;
    let strategy = build_strategy_config(&config)?;
    let tickers = resolve_tickers(tickers_override, &config)?;
    let port = open_data_port(&config)?;

    let records = run_check_pipeline(port.as_ref(), &strategy, &tickers);
    write_signals(&records, io::stdout())
}

/// One live signal as a flat CSV row.
#[derive(Debug, Serialize)]
struct SignalRow<'a> {
    ticker: &'a str,
    signal_time: String,
    entry_price: f64,
    open_price: f64,
    vwap: f64,
    yesterday_close: f64,
    pct_from_yesterday: f64,
    vwap_distance_pct: f64,
    open_distance_pct: f64,
    data_age_seconds: i64,
    confidence: f64,
    data_fresh: bool,
}

impl<'a> From<&'a SignalRecord> for SignalRow<'a> {
    fn from(r: &'a SignalRecord) -> Self {
        Self {
            ticker: &r.ticker,
            signal_time: r.signal_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry_price: r.entry_price,
            open_price: r.open_price,
            vwap: r.vwap,
            yesterday_close: r.yesterday_close,
            pct_from_yesterday: r.pct_from_yesterday,
            vwap_distance_pct: r.vwap_distance_pct,
            open_distance_pct: r.open_distance_pct,
            data_age_seconds: r.data_age_seconds,
            confidence: r.confidence,
            data_fresh: r.conditions.data_fresh,
        }
    }
}

/// Write live signals as CSV with a header row.
pub fn write_signals<W: io::Write>(records: &[SignalRecord], out: W) -> Result<(), SveaError> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(SignalRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// Live entry check for each ticker against today's session so far.
pub fn run_check_pipeline(
    port: &dyn MarketDataPort,
    strategy: &StrategyConfig,
    tickers: &[String],
) -> Vec<SignalRecord> {
    let now = port.clock_now();
    let today = now.date();

    let records: Vec<SignalRecord> = tickers
        .iter()
        .filter_map(|ticker| {
            let daily = port.get_historical(ticker, today - Duration::days(7), today, Interval::Day);
            let Some(yesterday) = daily.before(today).last() else {
                eprintln!("warning: {} has no previous close", ticker);
                return None;
            };
            let session = port.get_intraday(ticker, today, strategy.intraday_interval);
            let snapshot = LiveSnapshot::from_bars(
                &session.bars,
                yesterday.close,
                session.data_age_seconds.unwrap_or(0),
            )?;
            check_live(ticker, &snapshot, &strategy.signal_window, now)
        })
        .collect();

    eprintln!(
        "Checked {} tickers at {}: {} signals",
        tickers.len(),
        now.format("%H:%M:%S"),
        records.len()
    );
    records
}

fn run_validate(config_path: &Path) -> Result<(), SveaError> {
    let config = load_and_init(config_path)?;
    validate_data_config(&config)?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let strategy = build_strategy_config(&config)?;
    let bt = build_backtest_config(&config, None)?;
    print_plan(&strategy, &bt);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
