//! # News Ingestor
//!
//! Periodically pulls news articles for a hierarchy of topics/subtopics from
//! a search API, normalizes them into content-addressed records and writes
//! each run's results to a dated JSON file.
//!
//! ## Features
//!
//! - Rotates a pool of rate-limited API keys fairly across searches
//! - Bounded concurrency with per-search failure isolation
//! - Stable record ids (`news_<sha256(url)>`) so repeated runs are idempotent
//! - Content hashes for downstream change detection
//! - One-shot or scheduled operation; Ctrl-C keeps partial results
//!
//! ## Usage
//!
//! ```sh
//! news_ingestor -j ./out -c config/topics.yaml --api-key k1,k2,k3 --once
//! ```
//!
//! ## Architecture
//!
//! Each cycle follows a pipeline:
//! 1. **Catalog**: Load topics/subtopics and flatten them into work items
//! 2. **Dispatch**: Fan work items out over concurrent workers, each taking
//!    the next API key from the pool
//! 3. **Normalize**: Turn every search result into a `DataPoint`
//! 4. **Output**: Deduplicate by id and write the JSON file

use std::error::Error;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use itertools::Itertools;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod client;
mod config;
mod credentials;
mod dispatcher;
mod error;
mod identity;
mod models;
mod normalize;
mod outputs;
mod utils;

use catalog::TopicCatalog;
use cli::Cli;
use client::NewsClient;
use config::IngestConfig;
use dispatcher::Dispatcher;
use outputs::json;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "news_ingestor starting up");

    let args = Cli::parse();
    debug!(json_output_dir = %args.json_output_dir, catalog = %args.catalog.display(), once = args.once, "Parsed CLI arguments");

    let IngestConfig {
        credentials,
        workers,
        request_timeout,
        base_url,
        catalog_path,
        json_output_dir,
        interval,
    } = IngestConfig::from_cli(&args).inspect_err(|e| error!(error = %e, "Invalid configuration"))?;

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&json_output_dir).await {
        error!(
            path = %json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = Arc::new(NewsClient::new(&base_url, request_timeout)?);
    info!(endpoint = %client.endpoint(), "Search client ready");
    let dispatcher = Dispatcher::new(client, Arc::new(credentials), workers);
    debug!(workers = dispatcher.workers(), "Dispatcher ready");

    let shutdown = CancellationToken::new();
    spawn_interrupt_listener(shutdown.clone());

    if args.once {
        let written = run_cycle(&dispatcher, &catalog_path, &json_output_dir, &shutdown).await?;
        info!(written, "Single run complete");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = interval.as_secs(), "Scheduler started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match run_cycle(&dispatcher, &catalog_path, &json_output_dir, &shutdown).await {
            Ok(written) => info!(written, "Scheduled run complete"),
            Err(e) => error!(error = %e, "Scheduled run aborted; will retry next tick"),
        }

        if shutdown.is_cancelled() {
            break;
        }
    }

    info!("news_ingestor shut down");
    Ok(())
}

/// One ingestion cycle: catalog → dispatch → dedup → JSON.
///
/// A catalog failure aborts the cycle before any fetching. Per-search
/// failures never do. Returns the number of data points written.
#[instrument(level = "info", skip_all)]
async fn run_cycle(
    dispatcher: &Dispatcher<NewsClient>,
    catalog_path: &std::path::Path,
    json_output_dir: &str,
    shutdown: &CancellationToken,
) -> Result<usize, Box<dyn Error>> {
    let run_at = Utc::now();
    let start_time = std::time::Instant::now();

    let catalog = TopicCatalog::load(catalog_path).await?;
    let items = catalog.work_items();
    info!(work_items = items.len(), "Flattened topic catalog");

    let outcome = dispatcher.run(items, shutdown.child_token()).await;
    let fetched = outcome.len();
    let outcome = outcome.deduplicated();
    info!(
        fetched,
        unique = outcome.len(),
        duplicates = fetched - outcome.len(),
        "Deduplicated data points"
    );
    if outcome.is_empty() {
        warn!("No data points collected this cycle");
    }
    for (topic, count) in outcome.data_points().iter().counts_by(|dp| dp.topic.as_str()) {
        debug!(%topic, count, "Data points per topic");
    }

    json::write_outcome(&outcome, json_output_dir, run_at).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Ingestion cycle complete"
    );
    Ok(outcome.len())
}

/// Cancel `shutdown` on Ctrl-C. The current run still returns (and writes)
/// what it had collected.
fn spawn_interrupt_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received; cancelling in-flight work");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}
