//! Validated runtime configuration.
//!
//! [`IngestConfig`] is built once from the parsed [`Cli`] and treated as
//! immutable for the life of the process.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::cli::Cli;
use crate::credentials::CredentialPool;
use crate::error::ConfigError;

#[derive(Debug)]
pub struct IngestConfig {
    pub credentials: CredentialPool,
    pub workers: usize,
    pub request_timeout: Duration,
    pub base_url: String,
    pub catalog_path: PathBuf,
    pub json_output_dir: String,
    pub interval: Duration,
}

impl IngestConfig {
    /// Validate CLI/env input.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingCredentials`] when no non-blank key was given
    /// - [`ConfigError::InvalidWorkerCount`] for an explicit worker count of 0
    /// - [`ConfigError::InvalidTimeout`] / [`ConfigError::InvalidInterval`] for zero durations
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let credentials = CredentialPool::from_keys(&cli.api_keys)?;

        let workers = match cli.workers {
            Some(0) => return Err(ConfigError::InvalidWorkerCount),
            Some(n) => n,
            None => credentials.len(),
        };

        if cli.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if cli.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let config = Self {
            credentials,
            workers,
            request_timeout: Duration::from_secs(cli.timeout_secs),
            base_url: cli.base_url.clone(),
            catalog_path: cli.catalog.clone(),
            json_output_dir: cli.json_output_dir.clone(),
            interval: Duration::from_secs(cli.interval_secs),
        };

        info!(
            credentials = config.credentials.len(),
            workers = config.workers,
            timeout_secs = cli.timeout_secs,
            interval_secs = cli.interval_secs,
            base_url = %config.base_url,
            catalog = %config.catalog_path.display(),
            "Configuration loaded"
        );
        Ok(config)
    }
}
