//! Search API client.
//!
//! This module provides the single-request building block of the ingestor:
//! one search, one credential, one classified result.
//!
//! # Architecture
//!
//! - [`SearchApi`]: Trait the dispatcher is generic over
//! - [`NewsClient`]: `reqwest`-backed implementation against the `/everything` endpoint
//!
//! # Failure classification
//!
//! - Connect errors, timeouts and body read errors → [`FetchError::Transport`]
//! - Non-success status or an `"error"` payload → [`FetchError::Upstream`]
//! - A body that is not a search payload → [`FetchError::Decode`]
//!
//! Nothing here retries; the dispatcher drops failed items.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ConfigError, FetchError};
use crate::models::{Credential, RawArticle, SearchResponse};
use crate::utils::truncate_for_log;

/// Default base URL of the search API.
pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

const ENDPOINT: &str = "everything";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_IDLE_PER_HOST: usize = 10;
const ERROR_BODY_LOG_LIMIT: usize = 500;

/// One search request against the upstream API.
///
/// Implementors must be shareable across workers; each call carries its own
/// credential and query.
pub trait SearchApi: Send + Sync {
    fn search(
        &self,
        credential: &Credential,
        query: &str,
    ) -> impl Future<Output = Result<Vec<RawArticle>, FetchError>> + Send;
}

/// Client for the `/everything` search endpoint.
///
/// Holds only fixed configuration (endpoint and connection settings), so a
/// single instance is shared by every worker.
#[derive(Debug, Clone)]
pub struct NewsClient {
    endpoint: Url,
    http: reqwest::Client,
}

impl NewsClient {
    /// Build a client for `base_url` with a fixed per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the URL is invalid, the timeout is zero,
    /// or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        let raw = format!("{}/{}", base_url.trim_end_matches('/'), ENDPOINT);
        let endpoint = Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self { endpoint, http })
    }

    /// The endpoint requests are sent to (without query parameters).
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, credential: &Credential, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("searchIn", "title")
            .append_pair("sortBy", "relevancy")
            .append_pair("language", "en")
            .append_pair("apiKey", credential.secret());
        url
    }

    /// Run one relevancy-sorted, title-restricted English search.
    #[instrument(level = "debug", skip_all, fields(credential = %credential, %query))]
    pub async fn search_everything(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<SearchResponse, FetchError> {
        let t0 = Instant::now();
        let url = self.request_url(credential, query);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            debug!(
                %status,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body = %truncate_for_log(&body, ERROR_BODY_LOG_LIMIT),
                "Search API returned an error status"
            );
            return Err(FetchError::Upstream {
                status,
                body: truncate_for_log(&body, ERROR_BODY_LOG_LIMIT),
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        if parsed.status.eq_ignore_ascii_case("error") {
            let detail = format!(
                "{}: {}",
                parsed.code.as_deref().unwrap_or("unknown"),
                parsed.message.as_deref().unwrap_or_default()
            );
            return Err(FetchError::Upstream {
                status,
                body: detail,
            });
        }

        debug!(
            total_results = parsed.totalResults,
            returned = parsed.articles.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(parsed)
    }
}

impl SearchApi for NewsClient {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<RawArticle>, FetchError> {
        self.search_everything(credential, query)
            .await
            .map(|r| r.articles)
    }
}

/// Error code the search API puts in `status: "error"` payloads for a spent key.
const RATE_LIMITED_CODE: &str = "rateLimited";

/// Whether an error is the upstream's way of saying "this key is spent":
/// HTTP 429, or an error payload carrying the `rateLimited` code.
pub fn is_rate_limited(err: &FetchError) -> bool {
    match err {
        FetchError::Upstream { status, body } => {
            *status == StatusCode::TOO_MANY_REQUESTS || body.contains(RATE_LIMITED_CODE)
        }
        _ => false,
    }
}
