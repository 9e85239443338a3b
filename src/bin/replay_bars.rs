//! CLI demo: stream a CSV of bars through the engine and print emitted
//! `LegEvent`s as JSON Lines.
//!
//! Bar ingestion (CSV parsing, timestamp handling) is an external
//! collaborator per `spec.md` §1 — this reader is a thin, out-of-core
//! convenience for exercising the engine from the command line, not part
//! of the engine itself. Exit codes follow the teacher's
//! `backtest_run`-style discipline: 0 clean, 2 configuration error, 3
//! runtime/engine error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use rust_decimal::Decimal;

use swing_engine::{Bar, Engine, EngineConfig};

/// Stream OHLC bars through the swing-leg detection engine.
#[derive(Debug, Parser)]
#[command(name = "swing-engine-cli", version, about)]
struct Args {
    /// Path to a CSV file with rows: index,timestamp,open,high,low,close
    #[arg(long)]
    bars: PathBuf,

    /// Optional TOML file overriding engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick size used when no `--config` is given.
    #[arg(long, default_value = "0.01")]
    tick_size: String,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            EngineConfig::from_toml_str(&text).map_err(anyhow::Error::from)
        }
        None => {
            let tick_size: Decimal = args
                .tick_size
                .parse()
                .with_context(|| format!("invalid --tick-size {:?}", args.tick_size))?;
            Ok(EngineConfig::with_tick_size(tick_size))
        }
    }
}

fn parse_bar_line(line: &str) -> Result<Bar> {
    let fields: Vec<&str> = line.split(',').collect();
    anyhow::ensure!(
        fields.len() == 6,
        "expected 6 columns (index,timestamp,open,high,low,close), got {}",
        fields.len()
    );
    let index: u64 = fields[0].trim().parse().context("parsing index")?;
    let timestamp_secs: i64 = fields[1].trim().parse().context("parsing timestamp")?;
    let timestamp = Utc
        .timestamp_opt(timestamp_secs, 0)
        .single()
        .context("invalid timestamp")?;
    let open: Decimal = fields[2].trim().parse().context("parsing open")?;
    let high: Decimal = fields[3].trim().parse().context("parsing high")?;
    let low: Decimal = fields[4].trim().parse().context("parsing low")?;
    let close: Decimal = fields[5].trim().parse().context("parsing close")?;
    Ok(Bar::new(index, timestamp, open, high, low, close))
}

fn run(args: Args, config: EngineConfig) -> Result<()> {
    let mut engine = Engine::new(config).map_err(anyhow::Error::from)?;

    let file = File::open(&args.bars)
        .with_context(|| format!("opening bars file {}", args.bars.display()))?;
    let reader = BufReader::new(file);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let bar = parse_bar_line(&line)
            .with_context(|| format!("parsing bar at line {}", line_no + 1))?;
        let events = engine
            .process_bar(bar)
            .map_err(|e| anyhow::anyhow!("engine error at line {}: {e}", line_no + 1))?;
        for event in events {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(3)
        }
    }
}
