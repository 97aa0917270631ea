use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::app::{KindleError, Result};
use crate::fetcher::{FetchedPage, Fetcher};

pub const DEFAULT_WORKERS: usize = 10;

pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Fetch every URL, at most `workers` at a time.
    ///
    /// Results come back in input order.
    pub async fn fetch_all(&self, urls: Vec<String>) -> Vec<(String, Result<FetchedPage>)> {
        let mut handles = Vec::new();

        for url in urls {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();

            let handle = tokio::spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => fetcher.fetch(&url).await,
                    Err(e) => Err(KindleError::Other(format!("Fetch pool closed: {}", e))),
                };
                (url, result)
            });

            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                }
            }
        }

        results
    }
}
