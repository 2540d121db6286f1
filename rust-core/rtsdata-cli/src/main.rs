// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsload: bulk loader and export inspector for rtsdata.
//!
//! `load` runs a manifest into a redb store and prints the load report as
//! JSON. `inspect` parses one export and prints its reading counts. Logs go
//! to stderr so stdout stays machine-readable.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rtsdata_ingest::{
    default_jobs, read_readings, LoadOptions, Loader, Manifest, ReadingSummary, DEFAULT_CHUNK_SIZE,
};
use rtsdata_storage::MeasurementStore;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status of a load that finished with skipped files or tags.
const PARTIAL_LOAD: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "rtsload", version = VERSION, about = "Load and inspect well instrument exports")]
struct Cli {
    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every well of a manifest into a store.
    Load {
        /// JSON manifest listing wells, catalogs and data directories.
        #[arg(long)]
        manifest: PathBuf,

        /// redb database file, created if missing.
        #[arg(long)]
        db: PathBuf,

        /// Files parsed concurrently (default: CPUs - 1).
        #[arg(long)]
        jobs: Option<usize>,

        /// Rows per storage batch.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Print reading counts of one export file.
    Inspect {
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct Inspection {
    file: String,
    readings: usize,
    skipped: usize,
    first: Option<String>,
    last: Option<String>,
    summary: ReadingSummary,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Load {
            manifest,
            db,
            jobs,
            chunk_size,
        } => load(&manifest, &db, jobs, chunk_size).await,
        Command::Inspect { file } => {
            let inspection = inspect(&file)?;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load(
    manifest_path: &Path,
    db: &Path,
    jobs: Option<usize>,
    chunk_size: usize,
) -> anyhow::Result<ExitCode> {
    let manifest = Manifest::from_path(manifest_path)
        .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
    let store = MeasurementStore::open(db)
        .with_context(|| format!("opening store {}", db.display()))?;

    let options = LoadOptions {
        jobs: jobs.unwrap_or_else(default_jobs).max(1),
        chunk_size: chunk_size.max(1),
    };
    info!(jobs = options.jobs, chunk_size = options.chunk_size, "starting load");

    let report = Loader::new(Arc::new(store), options).load(&manifest).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(PARTIAL_LOAD))
    }
}

fn inspect(file: &Path) -> anyhow::Result<Inspection> {
    let parsed = read_readings(file)?;
    let first = parsed.readings.first().map(|r| r.timestamp.to_rfc3339());
    let last = parsed.readings.last().map(|r| r.timestamp.to_rfc3339());
    Ok(Inspection {
        file: file.display().to_string(),
        readings: parsed.readings.len(),
        skipped: parsed.skipped,
        first,
        last,
        summary: parsed.summary(),
    })
}
