//! Command-line pulse finder.
//!
//! Reads a TOML configuration and a single-channel trace (one sample per
//! line, `#` comments allowed) and prints the detected events as JSON.
//!
//! Run with:
//!   tms-findpulse --config findpulse.toml --trace cz.txt --srate 5000
//!   RUST_LOG=debug tms-findpulse -c findpulse.toml -t cz.txt -s 5000 --candidates

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use tms_pulse::{
    Candidate, Diagnostic, EventRecord, FindPulseConfig, PulseFinder, Thresholds, Trace,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TMS_FINDPULSE_CONFIG")]
    config: PathBuf,

    /// Trace file, one sample per line
    #[arg(short, long)]
    trace: PathBuf,

    /// Sampling rate in Hz
    #[arg(short, long)]
    srate: f64,

    /// Include the unlabeled peak candidates in the output
    #[arg(long)]
    candidates: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    events: Vec<EventRecord>,
    thresholds: Thresholds,
    diagnostics: &'a [Diagnostic],
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<&'a [Candidate]>,
}

fn read_trace(path: &Path) -> anyhow::Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;

    let mut samples = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value: f64 = line.parse().with_context(|| {
            format!("{}:{}: not a number: '{line}'", path.display(), lineno + 1)
        })?;
        samples.push(value);
    }
    Ok(samples)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config {}", cli.config.display()))?;
    let config = FindPulseConfig::from_toml_str(&text)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    info!(path = %cli.config.display(), "loaded config");

    let samples = read_trace(&cli.trace)?;
    if samples.is_empty() {
        bail!("trace {} holds no samples", cli.trace.display());
    }
    info!(samples = samples.len(), srate = cli.srate, "loaded trace");

    let trace = Trace::new(&samples, cli.srate)?;
    let detection = PulseFinder::new(config)?
        .run(&trace)
        .context("pulse search failed")?;

    let mut events = Vec::new();
    detection.annotate(&mut events)?;

    let report = Report {
        events,
        thresholds: detection.thresholds,
        diagnostics: &detection.diagnostics,
        candidates: cli.candidates.then_some(detection.candidates.as_slice()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
