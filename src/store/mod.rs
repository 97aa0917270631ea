pub mod json;

use chrono::{DateTime, Utc};

use crate::app::Result;

pub use json::JsonStateStore;

/// Remembers which bookmark URLs have already been processed.
pub trait DedupStore: Send + Sync {
    /// URLs from `urls` whose fingerprint has not been recorded, in order
    fn filter_new(&self, urls: &[String]) -> Vec<String>;

    /// Append one record per URL, duplicates included
    fn record_processed(&self, urls: &[String], at: DateTime<Utc>);

    /// Evict the oldest records beyond the retention limit
    fn trim_to_capacity(&self) -> usize;

    fn save(&self) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last_check(&self) -> Option<DateTime<Utc>>;
}
