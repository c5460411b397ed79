//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_adapter::JsonFileSource;
use crate::domain::analysis::{self, Analysis, AnalysisConfig};
use crate::domain::config_validation::{validate_analysis_config, validate_short_ratio};
use crate::domain::error::AnalyticsError;
use crate::domain::join::sort_candles;
use crate::domain::normalize::normalize_candles;
use crate::domain::performance::Summary;
use crate::domain::strategy::StrategyRegistry;
use crate::domain::windows;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportSink;
use crate::ports::source_port::BacktestSource;

#[derive(Parser, Debug)]
#[command(name = "gekkostat", about = "Analytics over backtest engine output")]
pub struct Cli {
    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the joint and monthly tables for a saved backtest result
    Analyze {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overrides [analysis] short_ratio
        #[arg(long)]
        short_ratio: Option<f64>,
    },
    /// Validate an analysis configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay a registered strategy over the candles of a backtest result
    Advise {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        strategy: String,
        #[arg(long, default_value_t = 1)]
        step: usize,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            input,
            config,
            output,
            short_ratio,
        } => run_analyze(&input, config.as_deref(), output.as_deref(), short_ratio),
        Command::Validate { config } => run_validate(&config),
        Command::Advise {
            input,
            strategy,
            step,
        } => run_advise(&input, &strategy, step),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, AnalyticsError> {
    FileConfigAdapter::from_file(path).map_err(|e| AnalyticsError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Analysis parameters from `[analysis]`, with an optional command-line
/// override for the short ratio.
pub fn build_analysis_config(
    adapter: &dyn ConfigPort,
    short_ratio_override: Option<f64>,
) -> Result<AnalysisConfig, AnalyticsError> {
    validate_analysis_config(adapter)?;
    let short_ratio = match short_ratio_override {
        Some(ratio) => {
            validate_short_ratio(ratio)?;
            ratio
        }
        None => adapter.get_double("analysis", "short_ratio", 0.0),
    };
    Ok(AnalysisConfig { short_ratio })
}

/// Command-line value first, then `[output] directory`, then the working
/// directory.
pub fn resolve_output_dir(cli_output: Option<&Path>, adapter: &dyn ConfigPort) -> PathBuf {
    cli_output
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("output", "directory").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Fetch, analyze and persist one backtest result.
pub fn run_analysis_pipeline(
    source: &dyn BacktestSource,
    sink: &dyn ReportSink,
    config: &AnalysisConfig,
    output_dir: &Path,
) -> Result<Analysis, AnalyticsError> {
    let payload = source.fetch_result()?;
    let analysis = analysis::analyze(&payload, config)?;
    sink.write(&analysis, output_dir)?;
    Ok(analysis)
}

fn run_analyze(
    input: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    short_ratio: Option<f64>,
) -> Result<(), AnalyticsError> {
    let adapter = match config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            load_config(path)?
        }
        None => FileConfigAdapter::empty(),
    };
    let config = build_analysis_config(&adapter, short_ratio)?;
    let output_dir = resolve_output_dir(output, &adapter);

    tracing::info!(
        input = %input.display(),
        short_ratio = config.short_ratio,
        "analyzing backtest result"
    );
    let source = JsonFileSource::new(input);
    let sink = CsvReportAdapter::new(adapter.get_bool("output", "include_indicators", true));
    let analysis = run_analysis_pipeline(&source, &sink, &config, &output_dir)?;

    print_summary(&analysis);
    eprintln!("\nReport written to: {}", output_dir.display());
    Ok(())
}

fn print_summary(analysis: &Analysis) {
    let summary = Summary::compute(&analysis.table);
    eprintln!("\n=== Summary ===");
    eprintln!("Rows:                 {}", summary.rows);
    eprintln!("Trades:               {}", summary.trades);
    eprintln!("Months:               {}", analysis.monthly.len());
    eprintln!("Market Return:        {:.2}%", summary.market_return * 100.0);
    eprintln!("Strategy Return:      {:.2}%", summary.strat_return * 100.0);
    eprintln!("Max Market Drawdown:  {:.1}%", summary.max_market_drawdown * 100.0);
    eprintln!("Max Strat Drawdown:   {:.1}%", summary.max_strat_drawdown * 100.0);
    eprintln!("Max Profit Drawdown:  {:.1}%", summary.max_profit_drawdown * 100.0);

    if !analysis.monthly.is_empty() {
        eprintln!("\n=== Monthly ===");
        for month in &analysis.monthly {
            eprintln!(
                "  {}-{:02}:  market {}  strategy {}",
                month.year,
                month.month,
                percent(month.market_profit),
                percent(month.strat_profit),
            );
        }
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}%", v * 100.0))
}

fn run_validate(config_path: &Path) -> Result<(), AnalyticsError> {
    tracing::info!(path = %config_path.display(), "validating config");
    let adapter = load_config(config_path)?;
    let config = build_analysis_config(&adapter, None)?;
    eprintln!("Config validated successfully");
    eprintln!("  short_ratio:         {}", config.short_ratio);
    eprintln!(
        "  output directory:    {}",
        resolve_output_dir(None, &adapter).display()
    );
    eprintln!(
        "  include_indicators:  {}",
        adapter.get_bool("output", "include_indicators", true)
    );
    Ok(())
}

fn run_advise(input: &Path, strategy_name: &str, step: usize) -> Result<(), AnalyticsError> {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.get(strategy_name)?;
    let payload = JsonFileSource::new(input).fetch_result()?;
    let candles = sort_candles(&normalize_candles(&payload.strat_candles)?)?;

    let records = windows::replay(strategy, &candles, step)?;
    write_advice(&records, io::stdout().lock())
}

/// Advice records as `timestamp,advice` CSV.
pub fn write_advice<W: io::Write>(
    records: &[windows::AdviceRecord],
    out: W,
) -> Result<(), AnalyticsError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["timestamp", "advice"])?;
    for record in records {
        writer.write_record([
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.advice.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
