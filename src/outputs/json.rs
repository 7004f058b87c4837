//! JSON sink for finished ingestion runs.
//!
//! Each run is written to its own file, grouped by UTC date:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 080000.json
//!     └── 081500.json
//! ```
//!
//! The file holds the run's data points as a JSON array. The writer makes no
//! delivery guarantees beyond "the file was written".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::SinkError;
use crate::models::FetchOutcome;

/// Path of the file a run started at `run_at` is written to.
pub fn outcome_path(json_output_dir: &str, run_at: DateTime<Utc>) -> PathBuf {
    Path::new(json_output_dir)
        .join(run_at.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", run_at.format("%H%M%S")))
}

/// Write `outcome` under `json_output_dir` and return the file path.
///
/// # Errors
///
/// Returns a [`SinkError`] if serialization, directory creation or the
/// write itself fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, count = outcome.len()))]
pub async fn write_outcome(
    outcome: &FetchOutcome,
    json_output_dir: &str,
    run_at: DateTime<Utc>,
) -> Result<PathBuf, SinkError> {
    let json = serde_json::to_string_pretty(outcome)?;
    let path = outcome_path(json_output_dir, run_at);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote data points");
    Ok(path)
}
