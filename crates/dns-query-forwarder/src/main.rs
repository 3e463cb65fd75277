// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use dns_query_collector::{
    config::{log_level_from_env, CollectorConfig},
    constants::DEFAULT_LOG_LEVEL,
    errors::FileAccessError,
    pipeline::forward_log,
    report::StatisticsReport,
};

const ENV_FILE: &str = ".env";
const EXIT_SUCCESS: u8 = 0;
const EXIT_FILE_ACCESS: u8 = 1;

/// Parse a BIND query log and send its queries to a custom collector.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the BIND query log file
    file_path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> ExitCode {
    let args = Args::parse();

    let env_file = load_env_file(ENV_FILE);
    init_logging(log_level_from_env().as_deref().unwrap_or(DEFAULT_LOG_LEVEL));
    match env_file {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => debug!("No {ENV_FILE} file found, using the process environment"),
        Err(e) => warn!("Ignoring {ENV_FILE}: {e}"),
    }

    let config = CollectorConfig::from_env();
    debug!("Loaded configuration: {config:?}");

    ExitCode::from(run(args, &config, &mut io::stdout(), &mut io::stderr()).await)
}

/// Loads `filename`, searched from the working directory upwards, into the
/// process environment. Variables that are already set win.
fn load_env_file(filename: impl AsRef<Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::from_filename(filename) {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Forwards the log named by `args` and writes the report to `out`.
///
/// Only an unreadable log file fails the run; its diagnostic goes to `err`.
async fn run<O, E>(args: Args, config: &CollectorConfig, out: &mut O, err: &mut E) -> u8
where
    O: Write,
    E: Write,
{
    let summary = match forward_log(&args.file_path, config).await {
        Ok(summary) => summary,
        Err(e) => {
            if !matches!(e, FileAccessError::NotFound(_)) {
                error!("{e}");
            }
            let _ = writeln!(err, "{e}");
            return EXIT_FILE_ACCESS;
        }
    };

    info!(
        "Delivered {} of {} queries from {} lines in {} batches ({} batches failed)",
        summary.delivery.records_sent,
        summary.aggregator.total(),
        summary.lines_read,
        summary.delivery.batches_sent,
        summary.delivery.batches_failed
    );

    let report = StatisticsReport::new(&summary.aggregator, config.top_n);
    if let Err(e) = report.write_to(out) {
        error!("Failed to print statistics: {e}");
    }

    EXIT_SUCCESS
}

fn init_logging(log_level: &str) {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");
}
