//! Fixed pool of upstream API credentials with fair round-robin selection.
//!
//! The pool is loaded once at startup and never changes. Selection advances a
//! single shared cursor atomically, so concurrent callers always receive
//! distinct, consecutive positions and every window of `len()` calls returns
//! each credential exactly once.
//!
//! The pool knows nothing about credential health: a key that is currently
//! rate-limited upstream is still handed out. Failures are the caller's
//! business.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use crate::error::ConfigError;
use crate::models::Credential;

#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from already-labelled credentials.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingCredentials`] if `credentials` is empty.
    pub fn new(credentials: Vec<Credential>) -> Result<Self, ConfigError> {
        if credentials.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        info!(count = credentials.len(), "Credential pool loaded");
        Ok(Self {
            credentials,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build a pool from raw API keys, labelling them `key-1`, `key-2`, ...
    ///
    /// Blank keys are discarded; labels follow the position among the kept keys.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = keys
            .into_iter()
            .filter_map(|k| {
                let k = k.as_ref().trim();
                (!k.is_empty()).then(|| k.to_string())
            })
            .enumerate()
            .map(|(i, secret)| Credential::new(format!("key-{}", i + 1), secret))
            .collect();
        Self::new(credentials)
    }

    /// Next credential in rotation.
    pub fn next(&self) -> &Credential {
        let n = self.credentials.len();
        // The closure always returns Some, so fetch_update cannot fail.
        let position = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % n))
        {
            Ok(prev) | Err(prev) => prev,
        };
        &self.credentials[position]
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false for a constructed pool; `new` rejects an empty one.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
