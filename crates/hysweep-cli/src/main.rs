use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use hysweep_core::{load_cached, EvaluationResult, Series, SweepConfig, SweepError};
use hysweep_engine::{CandidateSpace, PathMetrics, SweepEngine};

#[derive(Parser, Debug)]
#[command(name = "hysweep", about = "Hysteresis strategy hyperparameter sweep")]
struct Cli {
    /// Directory holding `<series>.csv` and its `.dat` cache
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Series file name, without extension
    #[arg(long, default_value = "S&P 500")]
    series: String,

    /// Column to read from the table
    #[arg(long, default_value = "1")]
    column: usize,

    /// Treat the column as prices and derive percent changes from it
    #[arg(long)]
    from_prices: bool,

    /// Path to TOML config file(s), comma-separated for merge
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// Worker count (overrides config; defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Number of ranked results to report (overrides config)
    #[arg(long)]
    top: Option<usize>,

    /// Output file path (stdout if not specified)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    meta: OutputMeta,
    best: EvaluationResult,
    best_path: PathMetrics,
    top: Vec<EvaluationResult>,
}

#[derive(Debug, Serialize)]
struct OutputMeta {
    series_file: String,
    column: usize,
    total_days: usize,
    candidates: usize,
    workers: usize,
    policy: &'static str,
    elapsed_ms: u128,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        report_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), SweepError> {
    let start = Instant::now();

    let config_paths: Vec<PathBuf> = cli.config.split(',').map(PathBuf::from).collect();
    let config_refs: Vec<&Path> = config_paths.iter().map(|p| p.as_path()).collect();
    let mut config = SweepConfig::from_toml_files(&config_refs)?;
    tracing::debug!(paths = ?config_paths, sweep = ?config.sweep, "config loaded");
    if let Some(workers) = cli.workers {
        config.sweep.workers = Some(workers as i64);
    }
    let top = cli.top.unwrap_or(config.sweep.top);

    // Load series
    eprintln!("Loading {:?} from {:?}...", cli.series, cli.data_dir);
    let load_start = Instant::now();
    let table = load_cached(&cli.data_dir, &cli.series)?;
    let column = table.column(cli.column)?;
    let series = if cli.from_prices {
        Series::from_prices(&column, config.units()?)?
    } else {
        Series::new(column)?
    };
    eprintln!(
        "Loaded {} days in {:.1}ms",
        series.len(),
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    // Build engine and candidates
    let default_workers = std::thread::available_parallelism().map_or(1, |n| n.get());
    let engine = SweepEngine::from_config(&config, default_workers)?;
    let space = CandidateSpace::from_config(&config, engine.strategy().policy())?.dedup();

    eprintln!(
        "Sweeping {} candidates on {} workers...",
        space.len(),
        engine.workers()
    );
    let run_start = Instant::now();
    let result = engine.run(&series, &space)?;
    eprintln!(
        "Sweep complete in {:.1}ms",
        run_start.elapsed().as_secs_f64() * 1000.0
    );

    let (_, best_path) = engine.best_path(&series, &result.best)?;
    let elapsed = start.elapsed();
    let report = OutputReport {
        meta: OutputMeta {
            series_file: cli.data_dir.join(&cli.series).display().to_string(),
            column: cli.column,
            total_days: series.len(),
            candidates: space.len(),
            workers: engine.workers(),
            policy: engine.strategy().policy().as_str(),
            elapsed_ms: elapsed.as_millis(),
        },
        best: result.best,
        best_path,
        top: result.top(top),
    };

    print_summary(&report);

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| SweepError::InvalidInput(format!("JSON serialization failed: {e}")))?;
    if let Some(output_path) = &cli.output_file {
        std::fs::write(output_path, &json).map_err(|e| {
            SweepError::InvalidInput(format!("failed to write {}: {e}", output_path.display()))
        })?;
        eprintln!("Results written to {:?}", output_path);
    } else {
        println!("{}", json);
    }

    eprintln!("\nTotal elapsed: {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn report_error(e: &SweepError) {
    eprintln!("Sweep failed [{:?}]: {}", e.kind(), e);
    if let Some((index, params)) = e.candidate() {
        eprintln!("  candidate #{index}: {params}");
    }
}

fn print_summary(report: &OutputReport) {
    eprintln!("\n{}", "=".repeat(80));
    eprintln!("Hysteresis Sweep Results");
    eprintln!("{}", "=".repeat(80));
    eprintln!(
        "Days: {} | Candidates: {} | Workers: {} | Policy: {} | Elapsed: {}ms",
        report.meta.total_days,
        report.meta.candidates,
        report.meta.workers,
        report.meta.policy,
        report.meta.elapsed_ms
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "{:<5} {:>10} {:>8} {:>8} {:>8} {:>8} {:>12}",
        "Rank", "Mult", "OutMult", "Pullout", "BackIn", "Lookback", "Value"
    );
    eprintln!("{}", "-".repeat(80));

    for (rank, r) in report.top.iter().enumerate() {
        eprintln!(
            "{:<5} {:>10.2} {:>8} {:>8.4} {:>8.4} {:>8} {:>12.4}",
            rank + 1,
            r.params.multiplier,
            r.params
                .out_multiplier
                .map(|m| format!("{m:.3}"))
                .unwrap_or_else(|| "-".into()),
            r.params.pullout_threshold,
            r.params.backin_threshold,
            r.params.lookback_days,
            r.score,
        );
    }

    eprintln!("{}", "-".repeat(80));
    let m = &report.best_path;
    eprintln!(
        "Best path: return {:.1}% | MaxDD {:.2}% | Sharpe {:.2} | in market {:.1}% | switches {}",
        m.total_return_pct * 100.0,
        m.max_drawdown_pct * 100.0,
        m.sharpe_ratio,
        m.days_in_market_pct * 100.0,
        m.switches,
    );
    eprintln!("{}", "=".repeat(80));
}
