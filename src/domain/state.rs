use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bookmark::fingerprint;

/// Maximum number of processed records kept on disk.
pub const RETENTION_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub url: String,
    #[serde(rename = "hash")]
    pub fingerprint: String,
    #[serde(rename = "timestamp")]
    pub processed_at: DateTime<Utc>,
}

impl ProcessedRecord {
    pub fn new(url: &str, processed_at: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            fingerprint: fingerprint(url),
            processed_at,
        }
    }
}

/// On-disk shape: `{"bookmarks": [...], "last_check": ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedState {
    #[serde(rename = "bookmarks", default)]
    pub records: Vec<ProcessedRecord>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
}

impl ProcessedState {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only the `limit` most recently processed records.
    ///
    /// Returns the number of evicted records.
    pub fn trim_to(&mut self, limit: usize) -> usize {
        if self.records.len() <= limit {
            return 0;
        }
        let before = self.records.len();
        self.records
            .sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        self.records.truncate(limit);
        before - limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_fingerprint_matches_url() {
        let record = ProcessedRecord::new("https://example.com", Utc::now());
        assert_eq!(record.fingerprint, fingerprint("https://example.com"));
    }

    #[test]
    fn test_trim_under_limit_is_noop() {
        let mut state = ProcessedState::default();
        state
            .records
            .push(ProcessedRecord::new("https://a.com", Utc::now()));
        assert_eq!(state.trim_to(10), 0);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let base = Utc::now();
        let mut state = ProcessedState::default();
        for i in 0..5 {
            state.records.push(ProcessedRecord::new(
                &format!("https://example.com/{}", i),
                base + Duration::seconds(i),
            ));
        }

        assert_eq!(state.trim_to(2), 3);
        let urls: Vec<_> = state.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/4", "https://example.com/3"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut state = ProcessedState::default();
        state
            .records
            .push(ProcessedRecord::new("https://a.com", Utc::now()));
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("bookmarks").is_some());
        assert!(json.get("last_check").is_some());
        assert!(json["bookmarks"][0].get("hash").is_some());
        assert!(json["bookmarks"][0].get("timestamp").is_some());
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let state: ProcessedState = serde_json::from_str("{}").unwrap();
        assert!(state.is_empty());
        assert!(state.last_check.is_none());
    }
}
