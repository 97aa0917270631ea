use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::app::{KindleError, Result};
use crate::sources::{BookmarkSource, SourceEntry, SourceSettings};

#[derive(Default)]
struct Inner {
    sources: BTreeMap<String, Arc<dyn BookmarkSource>>,
    entries: BTreeMap<String, SourceEntry>,
}

/// Named bookmark sources behind a single read/write lock.
///
/// Registration and configuration take the write lock; lookups share the
/// read lock. Sources are never removed.
#[derive(Default)]
pub struct SourceRegistry {
    inner: RwLock<Inner>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: Arc<dyn BookmarkSource>) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let name = source.name().to_string();
        if inner.sources.contains_key(&name) {
            return Err(KindleError::DuplicateSource(name));
        }

        info!(source = %name, "Registered bookmark source");
        inner.sources.insert(name, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BookmarkSource>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.sources.get(name).cloned()
    }

    /// Sources whose own `is_enabled` reports true, in name order
    pub fn list_enabled(&self) -> Vec<Arc<dyn BookmarkSource>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .sources
            .values()
            .filter(|s| s.is_enabled())
            .cloned()
            .collect()
    }

    /// Names of all registered sources, sorted
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.sources.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn configure(&self, name: &str, settings: SourceSettings) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let source = inner
            .sources
            .get(name)
            .cloned()
            .ok_or_else(|| KindleError::SourceNotFound(name.to_string()))?;

        source.configure(&settings)?;

        inner.entries.insert(
            name.to_string(),
            SourceEntry {
                name: name.to_string(),
                enabled: source.is_enabled(),
                settings,
            },
        );
        Ok(())
    }

    /// Last applied configuration for a source
    pub fn entry(&self, name: &str) -> Option<SourceEntry> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(name).cloned()
    }
}
