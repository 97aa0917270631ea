//! Conversion pipeline: turns bookmark URLs into documents on disk.
//!
//! # Architecture
//!
//! ```text
//! args → classify → Request → DocumentPipeline::queue → local files → mail
//! ```
//!
//! - [`classify`]: sorts arguments into URLs, URL-list files and local files
//! - [`ContentExtractor`]: pulls the readable part out of a page
//! - [`DocumentPipeline`]: fetches pages and writes offline HTML documents

mod classifier;
mod config;
mod document;
mod extractor;

pub use classifier::classify;
pub use config::ExtractorConfig;
pub use document::DocumentPipeline;
pub use extractor::{Article, ContentExtractor};

use std::path::PathBuf;

use async_trait::async_trait;

/// What kind of thing a request points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A single web page
    Url,
    /// A local text file listing web pages, one per line
    UrlFile,
    /// A document that can be sent as-is
    LocalFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub kind: RequestKind,
}

impl Request {
    pub fn new(path: impl Into<String>, kind: RequestKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Conversion collaborator used by the processor.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn classify(&self, items: &[String]) -> Vec<Request>;

    /// Produce one local file per request that could be converted.
    ///
    /// Per-item failures are logged and dropped.
    async fn queue(&self, requests: Vec<Request>) -> Vec<PathBuf>;
}
