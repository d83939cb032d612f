//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_feature_log::CsvFeatureLog;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::linear_scorer::LinearScorer;
use crate::adapters::notify_adapter::QueuedNotifier;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::bar::{Bar, Timeframe};
use crate::domain::config::PipelineConfig;
use crate::domain::config_validation::{validate_pipeline_config, validate_replay_config};
use crate::domain::error::PipelineError;
use crate::domain::pipeline::Pipeline;
use crate::domain::signal::{Direction, ScoringMode};
use crate::domain::timeline::{build_ticks, data_range};
use crate::domain::universe::{parse_codes, qualify_code, usable_codes};
use crate::ports::broker_port::HoldingsPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::feature_log_port::FeatureLogPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000_000.0;

#[derive(Parser, Debug)]
#[command(name = "tradepipe", about = "Intraday equity signal and execution pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay CSV bars through the pipeline against a paper broker
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        /// Feature log destination, overrides [feature_log] path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Replay a single code instead of [replay] codes
        #[arg(long)]
        code: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show bar counts and ranges per timeframe
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay {
            config,
            output,
            code,
        } => run_replay(&config, output.as_deref(), code.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, code } => run_info(&config, code.as_deref()),
    }
}

fn fail(e: PipelineError) -> ExitCode {
    eprintln!("error: {e}");
    (&e).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Totals printed at the end of a replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub instruments: usize,
    pub ticks: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub risk_signals: usize,
    pub orders: usize,
    pub final_value: f64,
    pub cash: f64,
}

/// `--code` override or `[replay] codes`, qualified with market prefixes.
pub fn resolve_codes(code_override: Option<&str>, config: &dyn ConfigPort) -> Result<Vec<String>, PipelineError> {
    let raw = match code_override {
        Some(c) => c.to_string(),
        None => config
            .get_string("replay", "codes")
            .ok_or_else(|| PipelineError::ConfigMissing {
                section: "replay".into(),
                key: "codes".into(),
            })?,
    };
    parse_codes(&raw).map_err(|e| PipelineError::config_invalid("replay", "codes", e.to_string()))
}

fn build_feature_log(
    config: &dyn ConfigPort,
    output: Option<&Path>,
) -> Result<Option<Box<dyn FeatureLogPort>>, PipelineError> {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => match config.get_string("feature_log", "path") {
            Some(p) => PathBuf::from(p),
            None => return Ok(None),
        },
    };
    let format = config
        .get_string("feature_log", "format")
        .unwrap_or_else(|| "csv".into())
        .trim()
        .to_lowercase();
    match format.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::{DEFAULT_BATCH_SIZE, SqliteFeatureLog};
            let batch = config
                .get_int("feature_log", "batch_size", DEFAULT_BATCH_SIZE as i64)
                .max(1) as usize;
            let log = SqliteFeatureLog::open(&path.to_string_lossy(), batch)?;
            Ok(Some(Box::new(log)))
        }
        "csv" => Ok(Some(Box::new(CsvFeatureLog::open(&path)?))),
        other => Err(PipelineError::config_invalid(
            "feature_log",
            "format",
            format!("unsupported format '{other}'"),
        )),
    }
}

/// Loads bars for every code plus the benchmark. Benchmark and daily bars
/// come first so they advance before intraday bars sharing a timestamp.
pub fn load_bars(
    data: &dyn MarketDataPort,
    codes: &[String],
    benchmark: &str,
) -> Result<Vec<Bar>, PipelineError> {
    let mut bars = match data.fetch_bars(benchmark, Timeframe::Benchmark) {
        Ok(b) => b,
        Err(e) => {
            warn!(instrument = %benchmark, error = %e, "no benchmark bars, benchmark return stays 0");
            Vec::new()
        }
    };
    for code in codes {
        match data.fetch_bars(code, Timeframe::Daily) {
            Ok(b) => bars.extend(b),
            Err(e) => warn!(instrument = %code, error = %e, "no daily bars, features will not be ready"),
        }
    }
    for code in codes {
        bars.extend(data.fetch_bars(code, Timeframe::Intraday)?);
    }
    Ok(bars)
}

/// Runs a whole replay and returns its totals.
///
/// Steps:
/// 1. Validate and build the pipeline configuration
/// 2. Resolve the universe and load bars
/// 3. Attach scorer, notifier and feature log from configuration
/// 4. Mark the paper broker and run the pipeline tick by tick
pub fn replay(
    config: &dyn ConfigPort,
    output: Option<&Path>,
    code_override: Option<&str>,
) -> Result<ReplaySummary, PipelineError> {
    validate_pipeline_config(config)?;
    validate_replay_config(config)?;
    let pipeline_config = PipelineConfig::from_config(config)?;

    let data_dir = config
        .get_string("replay", "data_dir")
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: "replay".into(),
            key: "data_dir".into(),
        })?;
    let benchmark = config
        .get_string("pipeline", "benchmark")
        .ok_or_else(|| PipelineError::ConfigMissing {
            section: "pipeline".into(),
            key: "benchmark".into(),
        })?;
    let benchmark = qualify_code(&benchmark)
        .map_err(|e| PipelineError::config_invalid("pipeline", "benchmark", e.to_string()))?;

    let data = CsvAdapter::new(PathBuf::from(data_dir));
    let codes = resolve_codes(code_override, config)?;
    let requested = codes.join(",");
    let codes = usable_codes(&data, codes).map_err(|_| PipelineError::NoData {
        instrument: requested,
    })?;
    eprintln!("Replaying {} instruments (profile {})", codes.len(), pipeline_config.profile);

    let bars = load_bars(&data, &codes, &benchmark)?;
    let ticks = build_ticks(bars);
    eprintln!("  Processing: {} ticks", ticks.len());

    let scoring = pipeline_config.signal.scoring;
    let mut pipeline = Pipeline::new(pipeline_config);
    if scoring == ScoringMode::Model {
        match LinearScorer::from_config(config) {
            Ok(scorer) => pipeline = pipeline.with_scorer(Box::new(scorer)),
            Err(e) => warn!(error = %e, "no model scorer, rule score will be used"),
        }
    }
    match QueuedNotifier::from_config(config) {
        Ok(Some(notifier)) => pipeline = pipeline.with_notifier(Box::new(notifier)),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "order notifications disabled"),
    }
    if let Some(log) = build_feature_log(config, output)? {
        pipeline = pipeline.with_feature_log(log);
    }
    for code in &codes {
        pipeline.register(code);
    }

    let capital = config.get_double("replay", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    let mut broker = PaperBroker::new(capital);
    let mut summary = ReplaySummary {
        instruments: codes.len(),
        ..ReplaySummary::default()
    };

    for tick in &ticks {
        broker.set_clock(tick.timestamp);
        for bar in tick.bars.iter().filter(|b| b.timeframe == Timeframe::Intraday) {
            broker.mark(&bar.instrument, bar.close);
        }
        let report = pipeline.on_tick(tick, &mut broker);
        summary.ticks += 1;
        summary.buy_signals += report.signals.iter().filter(|s| s.direction == Direction::Buy).count();
        summary.sell_signals += report.signals.iter().filter(|s| s.direction == Direction::Sell).count();
        summary.risk_signals += report.risks.len();
        summary.orders += report.orders();
    }
    pipeline.finish()?;

    summary.final_value = broker.total_value();
    summary.cash = broker.cash();
    info!(
        ticks = summary.ticks,
        orders = summary.orders,
        final_value = summary.final_value,
        "replay finished"
    );
    Ok(summary)
}

fn run_replay(config_path: &Path, output: Option<&Path>, code: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let summary = match replay(&adapter, output, code) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let capital = adapter.get_double("replay", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    let total_return = if capital > 0.0 {
        summary.final_value / capital - 1.0
    } else {
        0.0
    };

    eprintln!("\n=== Replay Summary ===");
    eprintln!("Instruments:      {}", summary.instruments);
    eprintln!("Ticks:            {}", summary.ticks);
    eprintln!("Buy signals:      {}", summary.buy_signals);
    eprintln!("Sell signals:     {}", summary.sell_signals);
    eprintln!("Risk signals:     {}", summary.risk_signals);
    eprintln!("Orders:           {}", summary.orders);
    eprintln!("Cash:             {:.2}", summary.cash);
    eprintln!("Final value:      {:.2}", summary.final_value);
    eprintln!("Total return:     {:.2}%", total_return * 100.0);
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_pipeline_config(&adapter) {
        return fail(e);
    }
    let cfg = match PipelineConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("\nPipeline:");
    eprintln!("  profile:        {}", cfg.profile);
    eprintln!("  scoring:        {}", cfg.signal.scoring);
    eprintln!("  exchange tz:    {}", cfg.signal.exchange_tz);
    eprintln!("  lookback:       {}", cfg.features.breakout_lookback);
    eprintln!(
        "  thresholds:     buy > {} / sell < {}",
        cfg.signal.buy_threshold, cfg.signal.sell_threshold
    );
    eprintln!(
        "  risk:           stop {:.2}% / take {:.2}%",
        cfg.risk.stop_loss_pct * 100.0,
        cfg.risk.take_profit_pct * 100.0
    );
    eprintln!(
        "  execution:      lot {} / cutoff {} / pyramiding {}",
        cfg.execution.lot_size, cfg.execution.sell_cutoff, cfg.execution.pyramiding
    );

    if cfg.signal.scoring == ScoringMode::Model {
        match LinearScorer::from_config(&adapter) {
            Ok(scorer) => eprintln!("  model features: {}", scorer.feature_names().join(", ")),
            Err(e) => eprintln!("  warning: {e}; rule score will be used"),
        }
    }

    if adapter.get_string("replay", "data_dir").is_some() {
        if let Err(e) = validate_replay_config(&adapter) {
            return fail(e);
        }
        match resolve_codes(None, &adapter) {
            Ok(codes) => eprintln!("  codes:          {}", codes.join(", ")),
            Err(e) => return fail(e),
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, code: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let data_dir = match config.get_string("replay", "data_dir") {
        Some(d) => d,
        None => {
            return fail(PipelineError::ConfigMissing {
                section: "replay".into(),
                key: "data_dir".into(),
            });
        }
    };
    let codes = match resolve_codes(code, &config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let data = CsvAdapter::new(PathBuf::from(data_dir));

    for c in &codes {
        for timeframe in Timeframe::ALL {
            if timeframe == Timeframe::Benchmark {
                continue;
            }
            print_range(&data, c, timeframe);
        }
    }
    if let Some(benchmark) = config.get_string("pipeline", "benchmark") {
        match qualify_code(&benchmark) {
            Ok(b) => print_range(&data, &b, Timeframe::Benchmark),
            Err(e) => eprintln!("warning: benchmark {benchmark}: {e}"),
        }
    }
    ExitCode::SUCCESS
}

fn print_range(data: &dyn MarketDataPort, code: &str, timeframe: Timeframe) {
    match data.fetch_bars(code, timeframe) {
        Ok(bars) => match data_range(&bars) {
            Some((first, last, count)) => {
                println!("{code} {timeframe}: {count} bars, {first} to {last}");
            }
            None => eprintln!("{code} {timeframe}: no data found"),
        },
        Err(e) => eprintln!("{code} {timeframe}: {e}"),
    }
}
