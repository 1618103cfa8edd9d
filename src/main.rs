use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbsim::arb::graph::{arbitrage_pairs, LegKind};
use arbsim::config::Config;
use arbsim::quote::TableQuotes;
use arbsim::run::{
    spawn_run, PriceHistory, ProgressSink, ReportBucket, Run, RunExit, RunRequest, RunState, RunStatus, Strategy,
};
use arbsim::utils::logger::setup_logger;
use clap::{CommandFactory, Parser, Subcommand};
use eyre::{Error, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::info;
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and write its report
    Run {
        /// Run request JSON file
        #[arg(long)]
        request: PathBuf,
        /// Quote table JSON file
        #[arg(long)]
        quotes: PathBuf,
        /// Override the request's strategy
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        /// Override the request's fee switch
        #[arg(long)]
        fees: Option<bool>,
        /// Report directory, defaults to ARBSIM_OUTPUT_DIR
        #[arg(long)]
        output: Option<PathBuf>,
        /// Progress slot to publish under
        #[arg(long, default_value = "default")]
        run_id: String,
    },
    /// List every tradeable leg of an asset universe
    Pairs {
        /// Comma separated platforms
        #[arg(long, value_delimiter = ',', required = true)]
        platforms: Vec<String>,
        /// Comma separated symbols
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
}

/// Report written at the end of a run
#[derive(Serialize)]
struct RunReport<'a> {
    run_id: &'a str,
    request: &'a RunRequest,
    status: RunStatus,
    steps: usize,
    trades: usize,
    total_profit: f64,
    total_fees: f64,
    buckets: Vec<ReportBucket>,
    prices: PriceHistory,
    state: &'a RunState,
}

async fn run_simulation(
    config: &Config,
    request_path: &Path,
    quotes_path: &Path,
    overrides: (Option<Strategy>, Option<bool>),
    output: Option<PathBuf>,
    run_id: &str,
) -> Result<(), Error> {
    let raw = fs::read_to_string(request_path)
        .wrap_err_with(|| format!("Failed to read run request {}", request_path.display()))?;
    let mut request = RunRequest::from_json(&raw)
        .wrap_err_with(|| format!("Failed to parse run request {}", request_path.display()))?;
    if let Some(strategy) = overrides.0 {
        request.strategy = strategy;
    }
    if let Some(fees) = overrides.1 {
        request.fees_enabled = fees;
    }

    let quotes = Arc::new(TableQuotes::from_file(quotes_path)?);
    info!(
        "main::run: Loaded {} quoted pairs from {}",
        quotes.pair_count(),
        quotes_path.display()
    );

    let sink = Arc::new(ProgressSink::new());
    let handle = spawn_run(
        Arc::clone(&sink),
        run_id,
        Run::new(request.clone(), quotes),
    );

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos:>3}% {msg}",
    )?);

    while !handle.is_finished() {
        tokio::time::sleep(config.poll_interval).await;
        let Some(progress) = sink.read(run_id) else {
            continue;
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = progress.percent().round() as u64;
        bar.set_position(percent);
        if let Some(state) = &progress.state {
            bar.set_message(format!("t={} trades={}", state.timestamp, state.report.len()));
        }
        if progress.status.is_terminal() {
            break;
        }
    }

    let exit = handle.await?;
    sink.clear(run_id);

    match exit {
        RunExit::Completed(state) => {
            bar.finish_with_message(format!("{} trades", state.report.len()));
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let path = write_report(&dir, run_id, &request, &state)?;
            println!(
                "Completed {} steps, {} trades, profit {:.8}, fees {:.8}",
                state.steps,
                state.report.len(),
                state.report.total_profit(),
                state.report.total_fees()
            );
            println!("Report written to {}", path.display());
            Ok(())
        }
        RunExit::Failed(e) => {
            bar.abandon_with_message("failed");
            Err(Error::new(e).wrap_err("Run request rejected"))
        }
        RunExit::Superseded => {
            bar.abandon_with_message("superseded");
            log::warn!("main::run: Run {run_id} was superseded before completing");
            Ok(())
        }
    }
}

/// Writes the report of a completed run to `{dir}/{run_id}.json`
fn write_report(dir: &Path, run_id: &str, request: &RunRequest, state: &RunState) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(format!("{run_id}.json"));

    let report = RunReport {
        run_id,
        request,
        status: state.status,
        steps: state.steps,
        trades: state.report.len(),
        total_profit: state.report.total_profit(),
        total_fees: state.report.total_fees(),
        buckets: state
            .report
            .buckets(request.start_timestamp, request.secondary_granularity),
        prices: state.prices(),
        state,
    };

    let file = File::create(&path)
        .wrap_err_with(|| format!("Failed to create report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
    info!("main::run: Wrote report to {}", path.display());
    Ok(path)
}

fn list_pairs(platforms: &[String], symbols: &[String]) {
    let pairs = arbitrage_pairs(platforms, symbols);
    for (kind, legs) in &pairs.iter().chunk_by(|pair| pair.kind) {
        let label = match kind {
            LegKind::Trade => "trade",
            LegKind::Transfer => "transfer",
        };
        println!("{label}: {}", legs.map(|pair| format!("{} -> {}", pair.from, pair.to)).join(", "));
    }
    println!("\nFound {} legs", pairs.len());
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    setup_logger(config.log_level)?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            request,
            quotes,
            strategy,
            fees,
            output,
            run_id,
        }) => {
            run_simulation(&config, &request, &quotes, (strategy, fees), output, &run_id).await?;
        }
        Some(Commands::Pairs { platforms, symbols }) => {
            list_pairs(&platforms, &symbols);
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
