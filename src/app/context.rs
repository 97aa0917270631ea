use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::app::error::Result;
use crate::config::{Config, DaemonSettings};
use crate::daemon::Daemon;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::logging::LogGuard;
use crate::mail::{MailSender, SendmailMailer};
use crate::pipeline::{DocumentPipeline, Pipeline};
use crate::processor::BookmarkProcessor;
use crate::sources::{FileSource, SourceRegistry};
use crate::store::{DedupStore, JsonStateStore};

/// Everything one command needs, built from a loaded [`Config`].
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub registry: Arc<SourceRegistry>,
    /// Processed-state file, opened fresh for every processor
    pub state_path: PathBuf,
    pub pipeline: Arc<dyn Pipeline>,
    pub mailer: Arc<dyn MailSender>,
}

impl AppContext {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Self> {
        let registry = Arc::new(SourceRegistry::new());
        registry.register(Arc::new(FileSource::new()))?;
        for (name, settings) in config.source_settings() {
            registry.configure(&name, settings)?;
            debug!(source = %name, "Configured bookmark source");
        }

        let state_path = config.state_path()?;

        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new()?);
        let pipeline: Arc<dyn Pipeline> = Arc::new(DocumentPipeline::new(
            fetcher,
            config.output.fetch_workers,
            config.extractor.clone(),
            config.store_path(),
        ));
        let mailer: Arc<dyn MailSender> = Arc::new(SendmailMailer::new(config.mail_settings()));

        Ok(Self {
            config,
            config_path,
            registry,
            state_path,
            pipeline,
            mailer,
        })
    }

    /// Daemon settings, with an optional interval override.
    pub fn daemon_settings(&self, interval: Option<Duration>) -> Result<DaemonSettings> {
        let mut settings = self.config.daemon_settings()?;
        if let Some(interval) = interval {
            settings.check_interval = interval;
        }
        Ok(settings)
    }

    /// Load the processed state as it is on disk right now.
    ///
    /// Another daemon may have written it since this context was built.
    pub fn open_store(&self) -> Arc<dyn DedupStore> {
        Arc::new(JsonStateStore::open(&self.state_path))
    }

    pub fn processor(&self, check_interval: Duration) -> BookmarkProcessor {
        BookmarkProcessor::new(
            self.registry.clone(),
            self.open_store(),
            self.pipeline.clone(),
            self.mailer.clone(),
            check_interval,
        )
    }

    pub fn daemon(&self, settings: DaemonSettings, log_guard: Option<LogGuard>) -> Daemon {
        let processor = Arc::new(self.processor(settings.check_interval));
        Daemon::new(settings, processor).with_log_guard(log_guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path, bookmark_path: &str) -> Config {
        let toml = format!(
            r#"
[daemon]
enabled = true
bookmark_path = "{}"
check_interval_minutes = 5
pid_file = "{}"

[output]
store_path = "{}"
"#,
            bookmark_path,
            dir.join("d.pid").display(),
            dir.join("out").display()
        );
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_context_configures_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let bookmarks = dir.path().join("bookmarks.txt");
        let ctx = AppContext::new(config_in(dir.path(), &bookmarks.display().to_string()), None)
            .unwrap();

        let enabled = ctx.registry.list_enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name(), "file");
        assert!(ctx.open_store().is_empty());
        assert_eq!(ctx.state_path, dir.path().join("processed_bookmarks.json"));
    }

    #[test]
    fn test_context_without_bookmark_path_has_no_enabled_sources() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(config_in(dir.path(), ""), None).unwrap();

        assert_eq!(ctx.registry.len(), 1);
        assert!(!ctx.processor(Duration::from_secs(60)).has_enabled_sources());
    }

    #[test]
    fn test_unknown_source_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path(), "");
        config.sources.insert("pocket".into(), Default::default());

        let err = AppContext::new(config, None).err().unwrap();
        assert!(matches!(err, crate::app::KindleError::SourceNotFound(ref n) if n == "pocket"));
    }

    #[test]
    fn test_processor_sees_state_saved_after_context_was_built() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(config_in(dir.path(), "/tmp/b.txt"), None).unwrap();
        let urls = vec!["https://already-sent.com".to_string()];

        // the previous daemon finishes its last cycle
        let previous = JsonStateStore::open(&ctx.state_path);
        previous.record_processed(&urls, chrono::Utc::now());
        previous.save().unwrap();

        let processor = ctx.processor(Duration::from_secs(60));
        assert!(processor.store().filter_new(&urls).is_empty());
    }

    #[test]
    fn test_interval_override() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::new(config_in(dir.path(), "/tmp/b.txt"), None).unwrap();

        let settings = ctx.daemon_settings(None).unwrap();
        assert_eq!(settings.check_interval, Duration::from_secs(300));
        assert_eq!(settings.pid_file, dir.path().join("d.pid"));

        let settings = ctx.daemon_settings(Some(Duration::from_secs(90))).unwrap();
        assert_eq!(settings.check_interval, Duration::from_secs(90));
    }
}
