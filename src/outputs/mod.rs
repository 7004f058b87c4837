//! Output sinks for finished ingestion runs.
//!
//! # Submodules
//!
//! - [`json`]: Writes a run's deduplicated data points to a dated JSON file

pub mod json;
