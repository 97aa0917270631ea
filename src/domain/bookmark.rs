use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A candidate URL read from a bookmark source.
///
/// Bookmarks are produced fresh on every read and never persisted; only
/// their [`fingerprint`] ends up in the processed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    pub title: String,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            source: source.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.url)
    }

}

/// Generate a deterministic dedup key from a bookmark URL
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
