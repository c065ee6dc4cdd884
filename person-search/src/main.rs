//! Person Search Loader Entry Point
//!
//! Reads newline-delimited JSON persons from the file given as first argument (or from
//! stdin), saves them through the sync service and waits for the final index flush.

use dotenv::dotenv;
use futures::{future, Stream, StreamExt};
use person_search::config::LogFormat;
use person_search::{BatchIndexer, Dependencies, LoadProgress, Settings, SyncError};
use person_search_shared::Person;
use std::env;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing(format: LogFormat) -> Result<(), SyncError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("person_search=info,person_search_repository=info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .try_init()
                .map_err(|e| SyncError::config(format!("Failed to initialize tracing: {}", e)))?;

            info!(
                service_name = "person-search",
                service_version = env!("CARGO_PKG_VERSION"),
                "Tracing initialized with JSON format"
            );
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
                .try_init()
                .map_err(|e| SyncError::config(format!("Failed to initialize tracing: {}", e)))?;

            info!(
                service_name = "person-search",
                service_version = env!("CARGO_PKG_VERSION"),
                "Tracing initialized with console output"
            );
        }
    }

    Ok(())
}

/// Open the input: the file at `path`, or stdin.
async fn open_input(path: Option<&str>) -> Result<Box<dyn AsyncRead + Unpin + Send>, SyncError> {
    match path {
        Some(path) => {
            info!(path = %path, "Reading persons from file");
            Ok(Box::new(File::open(path).await?))
        }
        None => {
            info!("Reading persons from stdin");
            Ok(Box::new(tokio::io::stdin()))
        }
    }
}

/// Decode one NDJSON line. Blank and malformed lines are skipped.
fn parse_line(line_number: usize, line: std::io::Result<String>) -> Option<Person> {
    let line = match line {
        Ok(line) => line,
        Err(e) => {
            error!(line = line_number, error = %e, "Failed to read input line");
            return None;
        }
    };
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<Person>(&line) {
        Ok(person) => Some(person),
        Err(e) => {
            warn!(line = line_number, error = %e, "Skipping malformed person");
            None
        }
    }
}

fn persons(input: Box<dyn AsyncRead + Unpin + Send>) -> impl Stream<Item = Person> {
    LinesStream::new(BufReader::new(input).lines())
        .enumerate()
        .filter_map(|(i, line)| future::ready(parse_line(i + 1, line)))
}

/// Log load and indexing progress every 10 seconds.
async fn report_progress(progress: Arc<LoadProgress>, indexer: Arc<BatchIndexer>) {
    let mut progress_timer = interval(Duration::from_secs(10));
    progress_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    progress_timer.tick().await;

    // Track previous values for rate calculation
    let mut prev_loaded: u64 = 0;
    let mut prev_time = Instant::now();

    loop {
        progress_timer.tick().await;

        let loaded = progress.loaded();
        let now = Instant::now();
        let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
        let persons_per_sec = if elapsed_secs > 0.0 {
            (loaded.saturating_sub(prev_loaded) as f64) / elapsed_secs
        } else {
            0.0
        };
        let stats = indexer.stats();

        info!(
            persons_loaded = loaded,
            persons_skipped = progress.skipped(),
            persons_per_sec = format!("{:.2}", persons_per_sec),
            index_operations_pending = indexer.pending(),
            index_operations_succeeded = stats.operations_succeeded,
            index_operations_failed = stats.operations_failed,
            "Load progress"
        );

        prev_loaded = loaded;
        prev_time = now;
    }
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing(LogFormat::from_env())?;

    info!("Starting person search loader");

    let settings = Settings::from_env()?;

    let deps = match Dependencies::new(&settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let path = env::args().nth(1);
    let input = open_input(path.as_deref()).await?;

    let progress = Arc::new(LoadProgress::new());
    let reporter = tokio::spawn(report_progress(
        Arc::clone(&progress),
        Arc::clone(&deps.indexer),
    ));

    tokio::select! {
        report = deps.loader.load(persons(input), &progress) => {
            info!(
                count = report.count,
                skipped = report.skipped,
                "Input exhausted"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, stopping load early");
        }
    }
    reporter.abort();

    // Ship whatever is still buffered before exiting
    if let Err(e) = deps.indexer.close().await {
        error!(error = %e, "Final index flush failed");
        return Err(e.into());
    }

    let report = progress.snapshot();
    info!(
        persons_loaded = report.count,
        persons_skipped = report.skipped,
        took_secs = format!("{:.2}", report.took.as_secs_f64()),
        persons_per_sec = format!("{:.2}", report.rate_per_second),
        "Person search loader finished"
    );
    Ok(())
}
