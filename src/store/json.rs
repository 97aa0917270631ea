use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::app::{KindleError, Result};
use crate::domain::{fingerprint, ProcessedRecord, ProcessedState, RETENTION_LIMIT};
use crate::store::DedupStore;

/// Processed-bookmark state persisted as a JSON document.
pub struct JsonStateStore {
    path: PathBuf,
    capacity: usize,
    state: RwLock<ProcessedState>,
}

impl JsonStateStore {
    /// Open the store, loading whatever state is on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = Self::load(&path);
        Self {
            path,
            capacity: RETENTION_LIMIT,
            state: RwLock::new(state),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort load: a missing file is an empty state, a malformed one
    /// is logged and discarded.
    pub fn load(path: &Path) -> ProcessedState {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), "No processed state loaded: {}", e);
                return ProcessedState::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), "Failed to load processed state, starting empty: {}", e);
                ProcessedState::default()
            }
        }
    }

    pub fn snapshot(&self) -> ProcessedState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_atomically(&self, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)
    }
}

impl DedupStore for JsonStateStore {
    fn filter_new(&self, urls: &[String]) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let seen: HashSet<&str> = state
            .records
            .iter()
            .map(|r| r.fingerprint.as_str())
            .collect();

        urls.iter()
            .filter(|url| !seen.contains(fingerprint(url).as_str()))
            .cloned()
            .collect()
    }

    fn record_processed(&self, urls: &[String], at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .extend(urls.iter().map(|url| ProcessedRecord::new(url, at)));
        state.last_check = Some(at);
    }

    fn trim_to_capacity(&self) -> usize {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = state.trim_to(self.capacity);
        if evicted > 0 {
            debug!(evicted, "Trimmed processed state");
        }
        evicted
    }

    fn save(&self) -> Result<()> {
        let data = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_vec_pretty(&*state)?
        };

        self.write_atomically(&data).map_err(|e| {
            KindleError::StatePersistence(format!("{}: {}", self.path.display(), e))
        })
    }

    fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn last_check(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_in(dir: &tempfile::TempDir) -> JsonStateStore {
        JsonStateStore::open(dir.path().join("processed_bookmarks.json"))
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.is_empty());
        assert!(store.last_check().is_none());
    }

    #[test]
    fn test_malformed_file_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_bookmarks.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonStateStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let urls = vec!["https://example.com/a".to_string()];

        assert_eq!(store.filter_new(&urls), urls);
        store.record_processed(&urls, Utc::now());
        assert!(store.filter_new(&urls).is_empty());
    }

    #[test]
    fn test_filter_preserves_order_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.record_processed(&["https://seen.com".to_string()], Utc::now());

        let urls: Vec<String> = ["https://b.com", "https://seen.com", "https://a.com", "https://b.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            store.filter_new(&urls),
            vec!["https://b.com", "https://a.com", "https://b.com"]
        );
    }

    #[test]
    fn test_record_counts_duplicates_in_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let urls = vec!["https://a.com".to_string(), "https://a.com".to_string()];

        store.record_processed(&urls, Utc::now());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_trim_keeps_most_recent_thousand() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let base = Utc::now();

        for i in 0..1500 {
            let url = format!("https://example.com/{}", i);
            store.record_processed(&[url], base + Duration::seconds(i));
        }
        assert_eq!(store.len(), 1500);

        assert_eq!(store.trim_to_capacity(), 500);
        assert_eq!(store.len(), 1000);

        let snapshot = store.snapshot();
        let oldest_kept = snapshot
            .records
            .iter()
            .map(|r| r.processed_at)
            .min()
            .unwrap();
        assert_eq!(oldest_kept, base + Duration::seconds(500));

        let old = vec!["https://example.com/499".to_string()];
        let recent = vec!["https://example.com/500".to_string()];
        assert_eq!(store.filter_new(&old), old);
        assert!(store.filter_new(&recent).is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("processed_bookmarks.json");
        let store = JsonStateStore::open(&path);
        let at = Utc::now();
        store.record_processed(&["https://a.com".to_string()], at);
        store.save().unwrap();

        assert!(!dir.path().join("state/processed_bookmarks.json.tmp").exists());

        let reopened = JsonStateStore::open(&path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.last_check(), Some(at));
        assert!(reopened.filter_new(&["https://a.com".to_string()]).is_empty());
    }

    #[test]
    fn test_save_failure_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = JsonStateStore::open(blocker.join("state.json"));
        store.record_processed(&["https://a.com".to_string()], Utc::now());

        let err = store.save().unwrap_err();
        assert!(matches!(err, KindleError::StatePersistence(_)));
        // in-memory state still advanced
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_custom_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).with_capacity(2);
        let base = Utc::now();
        for i in 0..3 {
            store.record_processed(&[format!("https://x.com/{}", i)], base + Duration::seconds(i));
        }
        assert_eq!(store.trim_to_capacity(), 1);
        assert_eq!(store.len(), 2);
    }
}
