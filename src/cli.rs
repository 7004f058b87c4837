//! Command-line interface definitions for the news ingestor.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment
//! variables (a `.env` file in the working directory is loaded first).

use std::path::PathBuf;

use clap::Parser;

use crate::client::DEFAULT_BASE_URL;

/// Command-line arguments for the news ingestor.
///
/// # Examples
///
/// ```sh
/// # One run with three keys
/// news_ingestor -j ./out --api-key k1,k2,k3 --once
///
/// # Scheduled every 15 minutes, keys from the environment
/// NEWS_API_KEYS=k1,k2,k3 news_ingestor -j ./out -c config/topics.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search API keys; repeat the flag or pass a comma-separated list
    #[arg(long = "api-key", env = "NEWS_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    pub api_keys: Vec<String>,

    /// Base URL of the search API
    #[arg(long, env = "NEWSAPI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Number of concurrent fetch workers (defaults to the number of API keys)
    #[arg(long, env = "INGEST_WORKERS")]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "NEWSAPI_TIMEOUT_SECONDS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Path to the topic catalog (YAML or JSON)
    #[arg(short, long, env = "TOPIC_CATALOG_PATH", default_value = "config/topics.yaml")]
    pub catalog: PathBuf,

    /// Output directory for the JSON data point files
    #[arg(short, long, env = "INGEST_OUTPUT_DIR")]
    pub json_output_dir: String,

    /// Seconds between scheduled runs
    #[arg(long, env = "SCHEDULE_INTERVAL_SECONDS", default_value_t = 900)]
    pub interval_secs: u64,

    /// Run a single ingestion cycle and exit
    #[arg(long)]
    pub once: bool,
}
