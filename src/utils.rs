//! Utility functions for string handling and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for log fields and captured upstream error bodies
//! - Conversion of catalog slugs into search keywords
//! - File system validation for the output directory

use std::error::Error;
use std::path::Path;

use tokio::fs;
use tracing::{info, instrument};

const PROBE_FILE: &str = ".ingest_write_probe";

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to the nearest
/// character boundary) with an ellipsis and byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Turn a catalog slug into a free-text search keyword.
///
/// Hyphens become spaces and runs of whitespace collapse, so
/// `"ai-in-biology"` searches for `"ai in biology"`.
pub fn keyword_from_slug(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Create `path` if needed and prove it accepts writes.
///
/// A run's results are only written at the end of a cycle, so a read-only
/// output directory has to be caught at startup instead.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    let dir = Path::new(path);
    fs::create_dir_all(dir).await?;

    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"ok").await?;
    if let Err(e) = fs::remove_file(&probe).await {
        // Leftover probe is harmless; the directory is still writable.
        info!(error = %e, "Could not remove write probe");
    }
    info!("Output directory is writable");
    Ok(())
}
