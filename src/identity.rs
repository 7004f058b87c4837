//! Content identity: stable, collision-resistant identifiers for fetched content.
//!
//! Identities are SHA-256 digests of a lightly normalized payload (trimmed,
//! lower-cased) so trivial formatting differences in the same logical value
//! map to the same identifier. Everything here is pure and safe to call from
//! any number of workers at once.

use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 of `payload` after trimming and lower-casing it.
pub fn hash(payload: &str) -> String {
    let normalized = payload.to_lowercase();
    let digest = Sha256::digest(normalized.trim().as_bytes());
    hex::encode(digest)
}

/// Identifier of an article: `{source_type}_{hash(url)}`.
///
/// Two fetches of the same URL always yield the same id, which is what makes
/// re-ingestion idempotent downstream.
pub fn id_for_article(url: &str, source_type: &str) -> String {
    format!("{}_{}", source_type, hash(url))
}
