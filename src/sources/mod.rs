//! Bookmark sources.
//!
//! A source is a named, independently configured provider of candidate
//! bookmarks. Sources are registered in a [`SourceRegistry`] and polled by
//! the processor once per cycle.

pub mod file;
pub mod registry;

pub use file::FileSource;
pub use registry::SourceRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::Bookmark;

/// Opaque per-source settings, as read from `[sources.<name>]`.
pub type SourceSettings = toml::Table;

/// Registration entry kept by the registry for each configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub enabled: bool,
    pub settings: SourceSettings,
}

/// Capability interface every bookmark source implements.
#[async_trait]
pub trait BookmarkSource: Send + Sync {
    /// Unique name of this source
    fn name(&self) -> &str;

    /// Whether this source is configured and should be polled
    fn is_enabled(&self) -> bool;

    /// Apply settings, validating them first
    fn configure(&self, settings: &SourceSettings) -> Result<()>;

    /// Read the current candidate bookmarks
    async fn get_bookmarks(&self) -> Result<Vec<Bookmark>>;
}
