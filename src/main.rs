mod config;
mod error;
mod gaps;
mod input;
mod normalizer;
mod output;
mod parsers;
mod pipeline;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use clap::Parser;
use log::{LevelFilter, info, warn};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use config::{Config, DetectMode, Precision, SAMPLE_PERIOD_SECS, SHORT_GAP_SECS};

/// Combine power recorder logs into one chronological `datetime,power` table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log files or directories containing them
    #[arg(value_name = "PATH", default_value = "power")]
    inputs: Vec<PathBuf>,

    /// Output CSV path, or "stdout"
    #[arg(short, long, default_value = "stdout")]
    output: String,

    /// Regex a file name must match to be picked up from a directory
    #[arg(long, default_value = input::DEFAULT_PATTERN)]
    pattern: String,

    /// How to decide the format of each file
    #[arg(long, value_enum, default_value_t = DetectMode::Auto)]
    detect: DetectMode,

    /// Precision of the stored power values
    #[arg(long, value_enum, default_value_t = Precision::Full)]
    precision: Precision,

    /// Round timestamps to the nearest second before merging
    #[arg(long)]
    round_seconds: bool,

    /// Seconds between consecutive legacy readings
    #[arg(long, default_value_t = SAMPLE_PERIOD_SECS)]
    sample_period: i64,

    /// Gaps shorter than this many seconds are reported as short
    #[arg(long, default_value_t = SHORT_GAP_SECS)]
    short_gap: i64,

    /// Write detected gaps to this JSON file
    #[arg(long, value_name = "FILE")]
    gaps: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Reload the written CSV and check it matches what was merged
    #[arg(long)]
    verify: bool,

    #[arg(long)]
    benchmark: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        if self.sample_period <= 0 {
            bail!("--sample-period must be positive, got {}", self.sample_period);
        }
        if self.short_gap <= 0 {
            bail!("--short-gap must be positive, got {}", self.short_gap);
        }
        Ok(Config {
            sample_period: TimeDelta::seconds(self.sample_period),
            short_gap: TimeDelta::seconds(self.short_gap),
            precision: self.precision,
            detect: self.detect,
            round_seconds: self.round_seconds,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let start_time = Instant::now();
    let config = args.config()?;
    log::debug!("config: {}", serde_json::to_string(&config)?);

    let pattern = Regex::new(&args.pattern)
        .with_context(|| format!("invalid --pattern '{}'", args.pattern))?;
    let files = input::discover(&args.inputs, &pattern)?;
    if files.is_empty() {
        warn!("no input files found, writing an empty table");
    }

    let combined = pipeline::combine_logs(&files, &config)?;
    if combined.series.is_empty() {
        warn!("no readings in any input file");
    }
    info!(
        "combined {} files into {} readings",
        combined.files.len(),
        combined.series.len()
    );

    let gaps = gaps::detect_gaps(&combined.series, &config);
    gaps::log_gaps(&gaps);
    if let Some(path) = &args.gaps {
        output::write_gap_report(path, &gaps)?;
        info!("wrote {} gaps to {}", gaps.len(), path.display());
    }

    output::write(&args.output, &combined.series)?;
    if args.verify {
        verify_output(&args.output, &combined.series)?;
    }
    info!("complete");

    if args.benchmark {
        print_benchmark_results(&combined, &gaps::GapSummary::from_gaps(&gaps), start_time.elapsed());
    }

    Ok(())
}

fn verify_output(output_arg: &str, series: &normalizer::MergedSeries) -> Result<()> {
    if matches!(output_arg, "stdout" | "-") {
        warn!("--verify needs a file output, skipping");
        return Ok(());
    }
    let loaded = output::load_combined(Path::new(output_arg))?;
    if &loaded != series {
        bail!("{output_arg} does not reload to the merged series");
    }
    info!("verified {} rows in {}", loaded.len(), output_arg);
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn print_benchmark_results(
    combined: &pipeline::Combined,
    summary: &gaps::GapSummary,
    duration: std::time::Duration,
) {
    let duration_secs = duration.as_secs_f64();
    let size_mb = combined.bytes as f64 / (1024.0 * 1024.0);
    let stats = &combined.stats;

    eprintln!("\n=== RUN SUMMARY ===");
    eprintln!("Files: {}", combined.files.len());
    eprintln!("Input size: {:.2} MB", size_mb);
    eprintln!("Readings parsed: {}", stats.readings_in);
    eprintln!("Rows written: {}", stats.readings_out);
    eprintln!("Duplicates averaged: {}", stats.duplicates_collapsed);
    if let (Some(first), Some(last)) = (combined.series.first(), combined.series.last()) {
        eprintln!("Span: {} .. {}", first.timestamp, last.timestamp);
    }
    eprintln!(
        "Gaps: {} ({} short, {} long, {} samples missing)",
        summary.count, summary.short, summary.long, summary.missing_samples
    );
    if let Some(longest) = &summary.longest {
        eprintln!(
            "Longest gap: {}s from {}",
            longest.duration.num_seconds(),
            longest.start
        );
    }
    eprintln!("Processing time: {:.3}s", duration_secs);
    if duration_secs > 0.0 {
        eprintln!("Throughput: {:.2} MB/s", size_mb / duration_secs);
        eprintln!(
            "Throughput: {:.0} readings/s",
            stats.readings_in as f64 / duration_secs
        );
    }
}
