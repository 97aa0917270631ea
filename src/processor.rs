//! One bookmark processing cycle: collect, filter, convert, deliver, commit.
//!
//! Bookmarks are marked processed once delivery has been *attempted*, not
//! once it is known to have succeeded. A failed send is logged and the
//! bookmarks are still recorded, so a flaky mail server never causes the
//! same documents to be re-sent on every cycle. The cost is that a failed
//! delivery is not retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::mail::{timeout_for_interval, MailSender};
use crate::pipeline::Pipeline;
use crate::sources::SourceRegistry;
use crate::store::DedupStore;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every bookmark read this cycle had been seen before
    NoNewBookmarks,
    /// New bookmarks existed but none could be classified
    NothingClassified { new: usize },
    /// Classification succeeded but no document was produced
    NothingProduced { new: usize },
    /// Documents were handed to the mailer and the bookmarks recorded
    Delivered {
        new: usize,
        documents: usize,
        mail_sent: bool,
        state_saved: bool,
    },
}

impl CycleOutcome {
    pub fn is_soft_failure(&self) -> bool {
        matches!(
            self,
            CycleOutcome::NothingClassified { .. } | CycleOutcome::NothingProduced { .. }
        )
    }
}

pub struct BookmarkProcessor {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn DedupStore>,
    pipeline: Arc<dyn Pipeline>,
    mailer: Arc<dyn MailSender>,
    check_interval: Duration,
}

impl BookmarkProcessor {
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<dyn DedupStore>,
        pipeline: Arc<dyn Pipeline>,
        mailer: Arc<dyn MailSender>,
        check_interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            pipeline,
            mailer,
            check_interval,
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn DedupStore> {
        &self.store
    }

    pub fn has_enabled_sources(&self) -> bool {
        !self.registry.list_enabled().is_empty()
    }

    /// Mail timeout: the poll interval, but never under a minute.
    pub fn mail_timeout_secs(&self) -> u64 {
        timeout_for_interval(self.check_interval)
    }

    /// Read every enabled source concurrently.
    ///
    /// A failing source contributes nothing; the others are unaffected.
    pub async fn collect(&self) -> Vec<String> {
        let sources = self.registry.list_enabled();
        let reads = sources.iter().map(|source| source.get_bookmarks());
        let results = join_all(reads).await;

        let mut urls = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(bookmarks) => {
                    info!(source = source.name(), count = bookmarks.len(), "Read bookmarks");
                    urls.extend(bookmarks.into_iter().map(|b| b.url));
                }
                Err(e) => {
                    warn!(source = source.name(), "Error reading bookmarks: {}", e);
                }
            }
        }
        urls
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let urls = self.collect().await;

        let new_urls = self.store.filter_new(&urls);
        if new_urls.is_empty() {
            info!("No new bookmarks found");
            return CycleOutcome::NoNewBookmarks;
        }
        let new = new_urls.len();
        info!(count = new, "Found new bookmarks to process");

        let requests = self.pipeline.classify(&new_urls);
        if requests.is_empty() {
            warn!(count = new, "No valid bookmarks to process");
            return CycleOutcome::NothingClassified { new };
        }
        info!(count = requests.len(), "Classified bookmarks for processing");

        let documents = self.pipeline.queue(requests).await;
        if documents.is_empty() {
            warn!(count = new, "No bookmarks were successfully converted");
            return CycleOutcome::NothingProduced { new };
        }

        let timeout = self.mail_timeout_secs();
        info!(
            documents = documents.len(),
            timeout_secs = timeout,
            "Sending documents"
        );
        let mail_sent = match self.mailer.send(&documents, timeout).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send mail: {}", e);
                false
            }
        };

        self.store.record_processed(&new_urls, Utc::now());
        self.store.trim_to_capacity();
        let state_saved = match self.store.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save processed state: {}", e);
                false
            }
        };

        info!(
            bookmarks = new,
            documents = documents.len(),
            mail_sent,
            "Processed bookmarks"
        );

        CycleOutcome::Delivered {
            new,
            documents: documents.len(),
            mail_sent,
            state_saved,
        }
    }
}
