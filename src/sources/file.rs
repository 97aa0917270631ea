use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::app::{KindleError, Result};
use crate::domain::Bookmark;
use crate::sources::{BookmarkSource, SourceSettings};

const SOURCE_NAME: &str = "file";

/// Reads bookmarks from a text file, or from every file in a directory.
///
/// Files are line oriented: one URL per line, blank lines and `#` comments
/// skipped, anything that isn't `http://` or `https://` silently ignored.
#[derive(Debug, Default)]
pub struct FileSource {
    path: RwLock<Option<PathBuf>>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: RwLock::new(Some(path.into())),
        }
    }

    fn path(&self) -> Option<PathBuf> {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn unavailable(reason: impl Into<String>) -> KindleError {
        KindleError::SourceUnavailable {
            source_name: SOURCE_NAME.to_string(),
            reason: reason.into(),
        }
    }

    async fn read_directory(dir: &Path) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| Self::unavailable(format!("error reading bookmark directory: {}", e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => continue,
                Ok(_) => files.push(entry.path()),
                Err(e) => warn!(path = %entry.path().display(), "Skipping entry: {}", e),
            }
        }
        // read_dir order is platform dependent
        files.sort();

        let mut urls = Vec::new();
        for path in files {
            match read_bookmark_file(&path).await {
                Ok(mut found) => urls.append(&mut found),
                Err(e) => warn!(path = %path.display(), "Error reading bookmark file: {}", e),
            }
        }
        Ok(urls)
    }
}

#[async_trait]
impl BookmarkSource for FileSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn is_enabled(&self) -> bool {
        self.path().is_some()
    }

    fn configure(&self, settings: &SourceSettings) -> Result<()> {
        let path = settings
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| KindleError::InvalidSourceConfig {
                source_name: SOURCE_NAME.to_string(),
                reason: "file source requires a 'path' setting".to_string(),
            })?;

        let mut guard = self.path.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(PathBuf::from(path.trim()));
        Ok(())
    }

    async fn get_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let path = self
            .path()
            .ok_or_else(|| Self::unavailable("file source is not enabled or configured"))?;

        let metadata = fs::metadata(&path).await.map_err(|e| {
            Self::unavailable(format!("bookmark path {} does not exist: {}", path.display(), e))
        })?;

        let urls = if metadata.is_dir() {
            Self::read_directory(&path).await?
        } else {
            read_bookmark_file(&path)
                .await
                .map_err(|e| Self::unavailable(format!("error reading bookmark file: {}", e)))?
        };

        debug!(path = %path.display(), count = urls.len(), "Read bookmarks");

        Ok(urls
            .into_iter()
            .map(|url| Bookmark::new(url, SOURCE_NAME))
            .collect())
    }
}

async fn read_bookmark_file(path: &Path) -> std::io::Result<Vec<String>> {
    let bytes = fs::read(path).await?;
    Ok(parse_bookmark_lines(&String::from_utf8_lossy(&bytes)))
}

/// Extract bookmark URLs from file content, preserving order.
pub fn parse_bookmark_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(String::from)
        .collect()
}
