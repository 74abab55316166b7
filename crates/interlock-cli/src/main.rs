//! Interlock conformance verifier.
//!
//! # Usage
//!
//! ```bash
//! # Check every backend listed in run.json, print a summary
//! interlock --config run.json
//!
//! # Write the per-template records as JSON and allow 8 concurrent cases
//! interlock --config run.json --report report.json --concurrency 8
//! ```
//!
//! Exits with status 1 when any case fails.

mod run_file;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use clap::Parser;
use interlock_client::{RemotePool, TransportConfig};
use interlock_core::{ConformanceRunner, RunReport};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::run_file::RunFile;

/// Cross-backend deterministic AEAD conformance verifier
#[derive(Parser, Debug)]
#[command(name = "interlock")]
#[command(about = "Checks that every backend claiming a key template produces identical ciphertexts")]
#[command(version)]
struct Args {
    /// Path to the JSON run configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Write the JSON report here
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Maximum concurrent cases, overrides the run file
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value = "10000")]
    request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let plan = RunFile::load(&args.config)?.into_plan()?;
    let config = match args.concurrency {
        Some(limit) => plan.config.with_max_concurrent_cases(limit)?,
        None => plan.config,
    };

    tracing::info!(config = %args.config.display(), backends = plan.addresses.len(), "loaded run file");

    let transport = TransportConfig::development()
        .with_request_timeout(Duration::from_millis(args.request_timeout_ms));
    let pool = RemotePool::new(plan.addresses, transport);

    let report = ConformanceRunner::new(config).run(&pool).await;
    pool.close().await;

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        tracing::info!(path = %path.display(), "report written");
    }

    for line in report.to_string().lines() {
        tracing::info!("{line}");
    }

    match report.into_result() {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!(error = %err, "conformance run failed");
            Ok(ExitCode::FAILURE)
        },
    }
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &report.records())?;
    writer.flush()?;
    Ok(())
}
