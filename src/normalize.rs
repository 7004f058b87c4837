//! Mapping of upstream search results into canonical [`DataPoint`]s.
//!
//! Normalization never fails. The only recoverable problem, an unparseable
//! `publishedAt`, is handled by substituting the normalization instant.
//! Callers must reject articles with a blank `url` beforehand, since the
//! article identity would otherwise degenerate to the hash of "".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::identity::{hash, id_for_article};
use crate::models::{DataPoint, RawArticle};

/// Source type stamped on every record produced from the news search API.
pub const SOURCE_TYPE_NEWS: &str = "news";

/// Metadata key holding the publisher name.
pub const META_SOURCE_NAME: &str = "source_name";
/// Metadata key holding the article author.
pub const META_AUTHOR: &str = "author";

/// Normalize `raw` using the current UTC time as the fetch timestamp.
pub fn normalize(raw: &RawArticle, topic: &str, subtopic: &str) -> DataPoint {
    normalize_at(raw, topic, subtopic, Utc::now())
}

/// Normalize `raw` with an explicit fetch instant.
pub fn normalize_at(
    raw: &RawArticle,
    topic: &str,
    subtopic: &str,
    now: DateTime<Utc>,
) -> DataPoint {
    let published_at = match DateTime::parse_from_rfc3339(raw.publishedAt.trim()) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            debug!(
                url = %raw.url,
                published_at = %raw.publishedAt,
                error = %e,
                "Unparseable publishedAt; using fetch time"
            );
            now
        }
    };

    let mut metadata = BTreeMap::new();
    metadata.insert(META_SOURCE_NAME.to_string(), raw.source.name.clone());
    metadata.insert(META_AUTHOR.to_string(), raw.author.clone());

    DataPoint {
        id: id_for_article(&raw.url, SOURCE_TYPE_NEWS),
        source_type: SOURCE_TYPE_NEWS.to_string(),
        topic: topic.to_string(),
        subtopic: subtopic.to_string(),
        title: raw.title.clone(),
        url: raw.url.clone(),
        description: raw.description.clone(),
        published_at,
        fetched_at: now,
        content_hash: hash(content_basis(raw)),
        metadata,
    }
}

/// Text the content hash is computed from: the trimmed description, or the
/// title when the description is blank.
pub fn content_basis(raw: &RawArticle) -> &str {
    let description = raw.description.trim();
    if description.is_empty() {
        &raw.title
    } else {
        description
    }
}
