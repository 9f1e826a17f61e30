//! CLI definition and dispatch.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    self as engine, lookback_start, BacktestConfig, BacktestResult, DEFAULT_LOOKBACK_DAYS,
};
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_database_config, validate_server_config,
    validate_strategy_config,
};
use crate::domain::error::CipherquantError;
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::position::TradeRecord;
use crate::domain::strategy::{Strategy, StrategyKind, StrategyParams};
use crate::domain::symbols::{parse_symbols, screen_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Parser, Debug)]
#[command(name = "cipherquant", about = "RSI and MACD strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one strategy over one or more symbols
    Backtest(BacktestArgs),
    /// Run every strategy on one symbol and rank them
    Compare {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        as_of: Option<String>,
        #[arg(long)]
        csv_dir: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Load CSV price files into the database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Symbol for a single file (default: file name)
        #[arg(long)]
        symbol: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the stored date range per symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List symbols with stored prices
    ListSymbols {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Show recorded trades
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the JSON API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::Compare {
            config,
            symbol,
            start,
            end,
            as_of,
            csv_dir,
            json,
        } => run_compare(
            config.as_deref(),
            &symbol,
            DateArgs {
                start: start.as_deref(),
                end: end.as_deref(),
                as_of: as_of.as_deref(),
            },
            csv_dir.as_deref(),
            json,
        ),
        Command::Import {
            config,
            symbol,
            files,
        } => run_import(&config, symbol.as_deref(), &files),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::ListSymbols { config, csv_dir } => {
            run_list_symbols(config.as_deref(), csv_dir.as_deref())
        }
        Command::Trades {
            config,
            symbol,
            strategy,
            page,
            per_page,
            json,
        } => run_trades(&config, symbol, strategy, page, per_page, json),
        Command::Validate { config } => run_validate(&config),
        Command::Serve { config } => run_serve(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e, &mut std::io::stderr()),
    }
}

/// Write the one-line failure report and pick the exit code.
pub fn report_failure(err: &CipherquantError, out: &mut impl std::io::Write) -> ExitCode {
    let _ = writeln!(out, "error: {err}");
    ExitCode::from(err)
}

/// Load `path`, or an empty configuration when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, CipherquantError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> StrategyParams {
    let defaults = StrategyParams::default();
    let period = |key: &str, default: usize| {
        config
            .get_int("strategy", key, default as i64)
            .max(1) as usize
    };
    StrategyParams {
        rsi_period: period("rsi_period", defaults.rsi_period),
        oversold: config.get_double("strategy", "oversold", defaults.oversold),
        overbought: config.get_double("strategy", "overbought", defaults.overbought),
        macd_fast: period("macd_fast", defaults.macd_fast),
        macd_slow: period("macd_slow", defaults.macd_slow),
        macd_signal: period("macd_signal", defaults.macd_signal),
        risk_managed: config.get_bool("strategy", "risk_managed", defaults.risk_managed),
        stop_loss: config.get_double("strategy", "stop_loss", defaults.stop_loss),
        take_profit: config.get_double("strategy", "take_profit", defaults.take_profit),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateArgs<'a> {
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub as_of: Option<&'a str>,
}

/// Command-line dates win over `[backtest]`; without either the range is the
/// trailing `lookback_days` ending at the evaluation date.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
    dates: DateArgs<'_>,
) -> Result<BacktestConfig, CipherquantError> {
    let as_of = match dates.as_of {
        Some(s) => parse_date(s, "as_of")?,
        None => Utc::now().date_naive(),
    };
    let configured = |key: &str| config.get_string("backtest", key);

    let end_date = match dates.end.map(str::to_string).or_else(|| configured("end_date")) {
        Some(s) => parse_date(&s, "end_date")?,
        None => as_of,
    };
    let start_date = match dates
        .start
        .map(str::to_string)
        .or_else(|| configured("start_date"))
    {
        Some(s) => parse_date(&s, "start_date")?,
        None => {
            let lookback = config.get_int("backtest", "lookback_days", DEFAULT_LOOKBACK_DAYS);
            lookback_start(end_date, lookback.max(1))?
        }
    };

    let bt = BacktestConfig {
        start_date,
        end_date,
        as_of,
    };
    bt.validate()?;
    Ok(bt)
}

pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, CipherquantError> {
    let list = match symbol_override {
        Some(s) => s.to_string(),
        None => config
            .get_string("backtest", "symbols")
            .ok_or_else(|| CipherquantError::ConfigMissing {
                section: "backtest".into(),
                key: "symbols".into(),
            })?,
    };
    Ok(parse_symbols(&list)?)
}

fn open_data_port(
    config: &dyn ConfigPort,
    csv_dir: Option<&Path>,
) -> Result<Box<dyn DataPort>, CipherquantError> {
    if let Some(dir) = csv_dir {
        return Ok(Box::new(CsvAdapter::new(dir.to_path_buf())));
    }
    #[cfg(feature = "sqlite")]
    {
        Ok(Box::new(open_store(config)?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(feature_required("sqlite", "reading prices without --csv-dir"))
    }
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: &dyn ConfigPort,
) -> Result<crate::adapters::sqlite_adapter::SqliteAdapter, CipherquantError> {
    validate_database_config(config)?;
    crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)
}

#[cfg(not(feature = "sqlite"))]
fn feature_required(feature: &str, what: &str) -> CipherquantError {
    CipherquantError::InvalidInput {
        reason: format!("the {feature} feature is required for {what}"),
    }
}

#[derive(Args, Debug, Default)]
pub struct BacktestArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// RSI or MACD
    #[arg(short, long, default_value = "RSI")]
    pub strategy: String,
    /// Overrides `[backtest] symbols`
    #[arg(long)]
    pub symbol: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    /// Evaluation date; rows after it are ignored (default: today)
    #[arg(long)]
    pub as_of: Option<String>,
    /// Read prices from `<DIR>/<SYMBOL>.csv` instead of the database
    #[arg(long)]
    pub csv_dir: Option<PathBuf>,
    /// Store the run and its trades in the database
    #[arg(long)]
    pub record: bool,
    /// Write chart data for a single symbol as JSON
    #[arg(long)]
    pub chart: Option<PathBuf>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct BacktestReport<'a> {
    symbol: &'a str,
    strategy: StrategyKind,
    total_return: f64,
    metrics: &'a PerformanceMetrics,
    trades: &'a [TradeRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<i64>,
}

pub fn run_backtest(args: &BacktestArgs) -> Result<(), CipherquantError> {
    let config = load_config(args.config.as_deref())?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let params = build_strategy_params(&config);
    let strategy = Strategy::from_id(&args.strategy, &params)?;
    let bt_config = build_backtest_config(
        &config,
        DateArgs {
            start: args.start.as_deref(),
            end: args.end.as_deref(),
            as_of: args.as_of.as_deref(),
        },
    )?;
    let symbols = resolve_symbols(args.symbol.as_deref(), &config)?;
    if args.chart.is_some() && symbols.len() != 1 {
        return Err(CipherquantError::InvalidInput {
            reason: "--chart needs exactly one symbol".into(),
        });
    }

    let data_port = open_data_port(&config, args.csv_dir.as_deref())?;
    let symbols = if symbols.len() > 1 {
        let screened = screen_symbols(data_port.as_ref(), symbols, strategy.minimum_bars())?;
        if screened.valid.is_empty() {
            return Err(CipherquantError::InvalidInput {
                reason: "no symbol has enough data".into(),
            });
        }
        screened.valid
    } else {
        symbols
    };

    tracing::info!(
        strategy = %strategy.kind(),
        symbols = symbols.len(),
        start = %bt_config.start_date,
        end = %bt_config.end_date,
        "running backtest"
    );

    let mut results = Vec::with_capacity(symbols.len());
    let mut first_error = None;
    for symbol in &symbols {
        match engine::run_backtest(data_port.as_ref(), symbol, &strategy, &bt_config) {
            Ok(result) => results.push(result),
            Err(e) if e.is_data_error() && symbols.len() > 1 => {
                tracing::warn!(%symbol, error = %e, "skipping symbol");
                first_error.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    if results.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    let run_ids = if args.record {
        record_runs(&config, &results)?
    } else {
        vec![None; results.len()]
    };

    if let (Some(path), Some(result)) = (&args.chart, results.first()) {
        write_json(path, &result.chart())?;
        tracing::info!(path = %path.display(), "wrote chart data");
    }

    if args.json {
        let reports: Vec<BacktestReport<'_>> = results
            .iter()
            .zip(&run_ids)
            .map(|(r, run_id)| BacktestReport {
                symbol: r.symbol(),
                strategy: r.strategy,
                total_return: r.metrics.total_return,
                metrics: &r.metrics,
                trades: r.trades(),
                run_id: *run_id,
            })
            .collect();
        print_json(&reports)?;
    } else {
        for result in &results {
            print_result(result);
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
fn record_runs(
    config: &dyn ConfigPort,
    results: &[BacktestResult],
) -> Result<Vec<Option<i64>>, CipherquantError> {
    use crate::ports::result_port::{ResultPort, RunRecord};

    let store = open_store(config)?;
    results
        .iter()
        .map(|result| {
            let summary = result.summary();
            store
                .record_run(&RunRecord {
                    symbol: summary.symbol,
                    strategy: summary.strategy.id().to_string(),
                    total_return: summary.total_return,
                    metrics: result.metrics.clone(),
                    trades: result.trades().to_vec(),
                    created_at: Utc::now(),
                })
                .map(Some)
        })
        .collect()
}

#[cfg(not(feature = "sqlite"))]
fn record_runs(
    _config: &dyn ConfigPort,
    _results: &[BacktestResult],
) -> Result<Vec<Option<i64>>, CipherquantError> {
    Err(feature_required("sqlite", "--record"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CipherquantError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CipherquantError::InvalidInput {
        reason: format!("cannot encode output: {e}"),
    })?;
    println!("{text}");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CipherquantError> {
    let text = serde_json::to_string(value).map_err(|e| CipherquantError::InvalidInput {
        reason: format!("cannot encode output: {e}"),
    })?;
    fs::write(path, text)?;
    Ok(())
}

fn print_metrics(m: &PerformanceMetrics) {
    println!("  Total Return:     {:.2}%", m.total_return * 100.0);
    println!("  Annualized:       {:.2}%", m.annualized_return * 100.0);
    println!("  Volatility:       {:.2}%", m.volatility * 100.0);
    println!("  Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("  Max Drawdown:     {:.2}%", m.max_drawdown * 100.0);
    println!("  Trades:           {}", m.trade_count);
    println!("  Win Rate:         {:.1}%", m.win_rate * 100.0);
    println!("  Profit Factor:    {:.2}", m.profit_factor);
    println!("  Avg Win / Loss:   {:.2}% / {:.2}%", m.avg_win * 100.0, m.avg_loss * 100.0);
}

fn print_result(result: &BacktestResult) {
    let first = result.series.bars.first().map(|b| b.date);
    let last = result.series.bars.last().map(|b| b.date);
    println!(
        "\n=== {} {} ({} bars{}) ===",
        result.symbol(),
        result.strategy,
        result.series.len(),
        match (first, last) {
            (Some(f), Some(l)) => format!(", {f} to {l}"),
            _ => String::new(),
        }
    );
    print_metrics(&result.metrics);
    if !result.trades().is_empty() {
        println!(
            "  {:<10}  {:<10}  {:>6}  {:>10}  {:>10}  {:>8}  exit",
            "entry", "exit", "side", "entry px", "exit px", "return"
        );
        for t in result.trades() {
            println!(
                "  {}  {}  {:>6}  {:>10.2}  {:>10.2}  {:>7.2}%  {}",
                t.entry_date,
                t.exit_date,
                if t.direction.value() > 0 { "long" } else { "short" },
                t.entry_price,
                t.exit_price,
                t.return_pct * 100.0,
                t.exit_reason.as_str()
            );
        }
    }
}

pub fn run_compare(
    config_path: Option<&Path>,
    symbol: &str,
    dates: DateArgs<'_>,
    csv_dir: Option<&Path>,
    json: bool,
) -> Result<(), CipherquantError> {
    let config = load_config(config_path)?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let params = build_strategy_params(&config);
    let bt_config = build_backtest_config(&config, dates)?;
    let symbol = symbol.trim().to_uppercase();
    let data_port = open_data_port(&config, csv_dir)?;
    let rows = engine::compare_strategies(data_port.as_ref(), &symbol, &params, &bt_config)?;

    if json {
        return print_json(&rows);
    }
    println!("{symbol}: {} to {}", bt_config.start_date, bt_config.end_date);
    for (rank, row) in rows.iter().enumerate() {
        match (&row.metrics, &row.error) {
            (Some(m), _) => println!(
                "  {}. {:<5} return {:>7.2}%  sharpe {:>6.2}  trades {:>3}  win rate {:>5.1}%",
                rank + 1,
                row.strategy,
                m.total_return * 100.0,
                m.sharpe_ratio,
                m.trade_count,
                m.win_rate * 100.0
            ),
            (None, Some(e)) => println!("  -  {:<5} {}", row.strategy, e),
            (None, None) => {}
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
pub fn run_import(
    config_path: &Path,
    symbol: Option<&str>,
    files: &[PathBuf],
) -> Result<(), CipherquantError> {
    use crate::adapters::csv_adapter::read_frame;

    if symbol.is_some() && files.len() > 1 {
        return Err(CipherquantError::InvalidInput {
            reason: "--symbol can only be used with a single file".into(),
        });
    }
    let config = load_config(Some(config_path))?;
    let store = open_store(&config)?;

    for file in files {
        let symbol = match symbol {
            Some(s) => s.trim().to_uppercase(),
            None => file
                .file_stem()
                .map(|s| s.to_string_lossy().to_uppercase())
                .ok_or_else(|| CipherquantError::InvalidInput {
                    reason: format!("cannot derive a symbol from {}", file.display()),
                })?,
        };
        let frame = read_frame(file, &symbol)?;
        let missing = frame.missing_columns();
        if !missing.is_empty() {
            tracing::warn!(
                %symbol,
                columns = ?missing.iter().map(|c| c.name()).collect::<Vec<_>>(),
                "importing file without some columns"
            );
        }
        let inserted = store.insert_bars(&frame.to_bars())?;
        println!("{symbol}: {} rows read, {inserted} new", frame.len());
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
pub fn run_import(
    _config_path: &Path,
    _symbol: Option<&str>,
    _files: &[PathBuf],
) -> Result<(), CipherquantError> {
    Err(feature_required("sqlite", "import"))
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), CipherquantError> {
    let config = load_config(Some(config_path))?;
    let data_port = open_data_port(&config, None)?;
    let symbols = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => data_port.list_symbols()?,
    };
    for s in &symbols {
        match data_port.get_data_range(s)? {
            Some((first, last, count)) => println!("{s}: {count} bars, {first} to {last}"),
            None => println!("{s}: no data found"),
        }
    }
    Ok(())
}

fn run_list_symbols(
    config_path: Option<&Path>,
    csv_dir: Option<&Path>,
) -> Result<(), CipherquantError> {
    let config = load_config(config_path)?;
    let data_port = open_data_port(&config, csv_dir)?;
    let symbols = data_port.list_symbols()?;
    for symbol in &symbols {
        println!("{symbol}");
    }
    tracing::info!(count = symbols.len(), "listed symbols");
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_trades(
    config_path: &Path,
    symbol: Option<String>,
    strategy: Option<String>,
    page: usize,
    per_page: usize,
    json: bool,
) -> Result<(), CipherquantError> {
    use crate::ports::result_port::{ResultPort, TradeQuery};

    if let Some(s) = strategy.as_deref() {
        s.parse::<StrategyKind>()?;
    }
    if page == 0 || per_page == 0 {
        return Err(CipherquantError::InvalidInput {
            reason: "page and per-page start at 1".into(),
        });
    }
    let config = load_config(Some(config_path))?;
    let store = open_store(&config)?;
    let result = store.list_trades(&TradeQuery {
        symbol: symbol.map(|s| s.trim().to_uppercase()),
        strategy,
        page,
        per_page,
    })?;

    if json {
        return print_json(&result);
    }
    for row in &result.trades {
        let t = &row.trade;
        println!(
            "#{:<4} {:<6} {:<4}  {}  {}  {:>7.2}%  {}",
            row.run_id,
            row.symbol,
            row.strategy,
            t.entry_date,
            t.exit_date,
            t.return_pct * 100.0,
            t.exit_reason.as_str()
        );
    }
    println!(
        "page {} of {} ({} trades)",
        result.page,
        result.total.div_ceil(result.per_page).max(1),
        result.total
    );
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_trades(
    _config_path: &Path,
    _symbol: Option<String>,
    _strategy: Option<String>,
    _page: usize,
    _per_page: usize,
    _json: bool,
) -> Result<(), CipherquantError> {
    Err(feature_required("sqlite", "trades"))
}

/// Validate every section and print what a run would use.
pub fn run_validate(config_path: &Path) -> Result<(), CipherquantError> {
    let config = load_config(Some(config_path))?;
    if config.get_string("database", "path").is_some() {
        validate_database_config(&config)?;
    }
    validate_server_config(&config)?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let params = build_strategy_params(&config);
    let bt_config = build_backtest_config(&config, DateArgs::default())?;

    println!("Configuration is valid");
    println!(
        "  RSI({}) oversold {} overbought {}, risk managed: {}",
        params.rsi_period, params.oversold, params.overbought, params.risk_managed
    );
    println!(
        "  MACD({},{},{})",
        params.macd_fast, params.macd_slow, params.macd_signal
    );
    println!(
        "  stop loss {:.2}%, take profit {:.2}%",
        params.stop_loss * 100.0,
        params.take_profit * 100.0
    );
    println!("  range: {} to {}", bt_config.start_date, bt_config.end_date);
    if let Some(list) = config.get_string("backtest", "symbols") {
        println!("  symbols: {}", parse_symbols(&list)?.join(", "));
    }
    Ok(())
}

#[cfg(feature = "web")]
fn run_serve(config_path: &Path) -> Result<(), CipherquantError> {
    use crate::adapters::web::{build_router, AppState};
    use std::net::SocketAddr;
    use std::sync::Arc;

    let config = load_config(Some(config_path))?;
    validate_server_config(&config)?;
    validate_strategy_config(&config)?;
    validate_backtest_config(&config)?;

    let store = Arc::new(open_store(&config)?);
    let bind = config
        .get_string("server", "bind")
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let addr: SocketAddr = bind.parse().map_err(|_| CipherquantError::ConfigInvalid {
        section: "server".into(),
        key: "bind".into(),
        reason: format!("cannot parse '{bind}'"),
    })?;

    let state = AppState {
        data_port: store.clone(),
        results: store,
        params: build_strategy_params(&config),
        lookback_days: config
            .get_int("backtest", "lookback_days", DEFAULT_LOOKBACK_DAYS)
            .clamp(1, engine::MAX_LOOKBACK_DAYS),
        as_of: None,
    };
    let router = build_router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, router).await
    })?;
    Ok(())
}

#[cfg(not(feature = "web"))]
fn run_serve(_config_path: &Path) -> Result<(), CipherquantError> {
    Err(CipherquantError::InvalidInput {
        reason: "the web feature is required for serve".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn cli_parses_backtest() {
        let cli = Cli::try_parse_from([
            "cipherquant",
            "backtest",
            "--strategy",
            "MACD",
            "--symbol",
            "aapl",
            "--csv-dir",
            "/tmp/prices",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest(args) => {
                assert_eq!(args.strategy, "MACD");
                assert_eq!(args.symbol.as_deref(), Some("aapl"));
                assert_eq!(args.csv_dir, Some(PathBuf::from("/tmp/prices")));
                assert!(args.json);
                assert!(!args.record);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_import_requires_files() {
        assert!(Cli::try_parse_from(["cipherquant", "import", "-c", "x.ini"]).is_err());
    }

    #[test]
    fn strategy_params_from_config() {
        let c = config("[strategy]\nrsi_period = 10\noversold = 25\nrisk_managed = false\n");
        let p = build_strategy_params(&c);
        assert_eq!(p.rsi_period, 10);
        assert_eq!(p.oversold, 25.0);
        assert_eq!(p.overbought, 70.0);
        assert!(!p.risk_managed);
        assert_eq!(p.macd_slow, 26);
    }

    #[test]
    fn backtest_config_prefers_command_line() {
        let c = config("[backtest]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n");
        let bt = build_backtest_config(
            &c,
            DateArgs {
                start: Some("2023-06-01"),
                end: None,
                as_of: Some("2024-01-15"),
            },
        )
        .unwrap();
        assert_eq!(bt.start_date, date("2023-06-01"));
        assert_eq!(bt.end_date, date("2023-12-31"));
        assert_eq!(bt.as_of, date("2024-01-15"));
    }

    #[test]
    fn backtest_config_lookback_default() {
        let c = config("[backtest]\nlookback_days = 30\n");
        let bt = build_backtest_config(
            &c,
            DateArgs {
                as_of: Some("2024-03-31"),
                ..DateArgs::default()
            },
        )
        .unwrap();
        assert_eq!(bt.end_date, date("2024-03-31"));
        assert_eq!(bt.start_date, date("2024-03-01"));
    }

    #[test]
    fn failure_is_reported_once() {
        let err = CipherquantError::InvalidInput {
            reason: "bad window".into(),
        };
        let mut out = Vec::new();
        report_failure(&err, &mut out);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "error: invalid input: bad window\n");
    }

    #[test]
    fn backtest_config_rejects_oversized_lookback() {
        let c = config("[backtest]\nlookback_days = 9223372036854775807\n");
        let result = build_backtest_config(
            &c,
            DateArgs {
                as_of: Some("2024-03-31"),
                ..DateArgs::default()
            },
        );
        assert!(matches!(result, Err(CipherquantError::InvalidInput { .. })));
    }

    #[test]
    fn backtest_config_rejects_future_start() {
        let c = config("");
        let result = build_backtest_config(
            &c,
            DateArgs {
                start: Some("2030-01-01"),
                end: Some("2030-02-01"),
                as_of: Some("2024-01-01"),
            },
        );
        assert!(matches!(result, Err(CipherquantError::InvalidInput { .. })));
    }

    #[test]
    fn symbols_override_and_config() {
        let c = config("[backtest]\nsymbols = aapl, msft\n");
        assert_eq!(resolve_symbols(None, &c).unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(resolve_symbols(Some("goog"), &c).unwrap(), vec!["GOOG"]);
        assert!(matches!(
            resolve_symbols(None, &config("")),
            Err(CipherquantError::ConfigMissing { .. })
        ));
    }
}
