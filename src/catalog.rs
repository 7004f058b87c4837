//! Topic catalog: the read-only topic/subtopic hierarchy that drives a run.
//!
//! The catalog is a YAML or JSON file:
//!
//! ```yaml
//! topics:
//!   - name: Technology
//!     slug: technology
//!     subtopics:
//!       - name: AI in Biology
//!         slug: ai-biology
//! ```
//!
//! It is read once per run and flattened into one [`WorkItem`] per subtopic.
//! Topics without subtopics produce no work.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::ConfigError;
use crate::models::WorkItem;
use crate::utils::keyword_from_slug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicCatalog {
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Topic {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub subtopics: Vec<SubTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubTopic {
    pub name: String,
    pub slug: String,
}

impl TopicCatalog {
    /// Load a catalog from `path`; `.json` files are parsed as JSON, anything
    /// else as YAML.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::CatalogRead {
                path: path.to_path_buf(),
                source,
            })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str::<TopicCatalog>(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str::<TopicCatalog>(&content).map_err(|e| e.to_string())
        };
        let catalog = parsed.map_err(|reason| ConfigError::CatalogFormat {
            path: path.to_path_buf(),
            reason,
        })?;

        info!(topics = catalog.topics.len(), "Loaded topic catalog");
        Ok(catalog)
    }

    /// One work item per subtopic, keyed by slugs, searching for the
    /// subtopic slug with hyphens turned into spaces.
    pub fn work_items(&self) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for topic in &self.topics {
            if topic.subtopics.is_empty() {
                debug!(topic = %topic.slug, "Topic has no subtopics; nothing to search");
            }
            for sub in &topic.subtopics {
                let keyword = keyword_from_slug(&sub.slug);
                if keyword.is_empty() {
                    debug!(topic = %topic.slug, subtopic = %sub.name, "Subtopic slug is blank; skipping");
                    continue;
                }
                items.push(WorkItem::new(topic.slug.clone(), sub.slug.clone(), keyword));
            }
        }
        items
    }
}
