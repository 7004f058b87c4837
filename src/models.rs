//! Data models for search work, upstream articles and their canonical records.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Credential`]: One upstream API key with a printable label
//! - [`WorkItem`]: One (topic, subtopic, keyword) unit of fetch work
//! - [`RawArticle`] / [`SearchResponse`]: The upstream wire shape
//! - [`DataPoint`]: The canonical, content-addressed output record
//! - [`FetchOutcome`]: Everything one ingestion run produced
//!
//! The wire types use camelCase field names to match the search API's JSON,
//! while [`DataPoint`] keeps the snake_case names downstream consumers expect.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};

/// One upstream API key.
///
/// The secret is only ever read by the fetch client. `Debug` and `Display`
/// print the label alone so credentials can appear in log fields.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    label: String,
    secret: String,
}

impl Credential {
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// One unit of fetch work, produced by flattening the topic catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Slug of the parent topic.
    pub topic: String,
    /// Slug of the subtopic.
    pub subtopic: String,
    /// Free-text query sent upstream.
    pub keyword: String,
}

impl WorkItem {
    pub fn new(
        topic: impl Into<String>,
        subtopic: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subtopic: subtopic.into(),
            keyword: keyword.into(),
        }
    }
}

/// Publisher block of an upstream article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ArticleSource {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

/// A single article as returned by the search API.
///
/// Upstream sends `null` for any field it does not know; those decode as
/// empty strings so the normalizer never has to care.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawArticle {
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub urlToImage: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub publishedAt: String,
}

/// Top-level search response.
///
/// Error payloads carry `code`/`message` and an empty article list.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub totalResults: u64,
    #[serde(default)]
    pub articles: Vec<RawArticle>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Canonical normalized record handed to the downstream sink.
///
/// # Invariants
///
/// * `id` is a pure function of `url` and `source_type`
/// * `content_hash` is a pure function of the content basis (description, else title)
/// * `published_at` is always a valid instant; it falls back to the fetch time
/// * `fetched_at` is the wall-clock time of normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    #[serde(rename = "data_id")]
    pub id: String,
    pub source_type: String,
    pub topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtopic: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    #[serde(rename = "fetch_timestamp")]
    pub fetched_at: DateTime<Utc>,
    pub content_hash: String,
    #[serde(rename = "raw_metadata")]
    pub metadata: BTreeMap<String, String>,
}

/// The data points produced by one ingestion run, in completion order.
///
/// Duplicates are expected (the same article often matches several
/// subtopics); call [`FetchOutcome::deduplicated`] before storing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FetchOutcome {
    data_points: Vec<DataPoint>,
}

impl FetchOutcome {
    pub fn new(data_points: Vec<DataPoint>) -> Self {
        Self { data_points }
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    /// Keep only the first data point seen for each `id`.
    pub fn deduplicated(self) -> Self {
        let data_points = self
            .data_points
            .into_iter()
            .unique_by(|dp| dp.id.clone())
            .collect();
        Self { data_points }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
