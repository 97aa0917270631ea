pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;
pub use parallel::ParallelFetcher;

/// A downloaded web page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub url: String,
    pub body: String,
    pub content_type: Option<String>,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(true)
    }
}

#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}
