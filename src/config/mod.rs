//! Configuration management for kindle-send.
//!
//! Configuration is read from `~/.config/kindle-send/config.toml` unless a
//! path is given on the command line. If the default file doesn't exist, a
//! default configuration with comments is created.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::pipeline::ExtractorConfig;
use crate::sources::SourceSettings;

const APP_DIR: &str = "kindle-send";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mail: MailConfig,
    pub daemon: DaemonSection,
    pub output: OutputConfig,
    pub extractor: ExtractorConfig,
    /// Per-source settings, keyed by source name
    pub sources: BTreeMap<String, SourceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Address documents are sent from
    pub sender: String,
    /// Address of the destination device
    pub receiver: String,
    /// Local MTA binary used for delivery
    pub sendmail_command: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            receiver: String::new(),
            sendmail_command: "sendmail".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub enabled: bool,
    pub bookmark_path: String,
    pub check_interval_minutes: u64,
    pub log_path: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            enabled: false,
            bookmark_path: String::new(),
            check_interval_minutes: 15,
            log_path: None,
            pid_file: None,
            state_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory generated documents are written to
    pub store_path: Option<PathBuf>,
    /// Maximum concurrent page downloads
    pub fetch_workers: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            fetch_workers: crate::fetcher::parallel::DEFAULT_WORKERS,
        }
    }
}

/// Read-only daemon values for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub enabled: bool,
    pub bookmark_path: Option<PathBuf>,
    pub check_interval: Duration,
    pub log_path: PathBuf,
    pub pid_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub sender: String,
    pub receiver: String,
    pub sendmail_command: String,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/kindle-send/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR))
    }

    pub fn daemon_settings(&self) -> Result<DaemonSettings, ConfigError> {
        let pid_file = match &self.daemon.pid_file {
            Some(p) => p.clone(),
            None => Self::config_dir()?.join("kindle-send.pid"),
        };
        let log_path = match &self.daemon.log_path {
            Some(p) => p.clone(),
            None => Self::config_dir()?.join("kindle-send.log"),
        };
        let bookmark_path = Some(self.daemon.bookmark_path.trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(DaemonSettings {
            enabled: self.daemon.enabled,
            bookmark_path,
            check_interval: Duration::from_secs(
                self.daemon.check_interval_minutes.saturating_mul(60),
            ),
            log_path,
            pid_file,
        })
    }

    pub fn mail_settings(&self) -> MailSettings {
        MailSettings {
            sender: self.mail.sender.clone(),
            receiver: self.mail.receiver.clone(),
            sendmail_command: self.mail.sendmail_command.clone(),
        }
    }

    /// Processed-state file, next to the PID file unless configured.
    pub fn state_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(p) = &self.daemon.state_path {
            return Ok(p.clone());
        }
        let settings = self.daemon_settings()?;
        let dir = settings
            .pid_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(dir.join("processed_bookmarks.json"))
    }

    pub fn store_path(&self) -> PathBuf {
        self.output
            .store_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR))
    }

    /// Settings for every configured source, with `daemon.bookmark_path`
    /// folded into the `file` source.
    pub fn source_settings(&self) -> BTreeMap<String, SourceSettings> {
        let mut sources = self.sources.clone();
        let path = self.daemon.bookmark_path.trim();
        if !path.is_empty() {
            sources
                .entry("file".to_string())
                .or_default()
                .insert("path".to_string(), toml::Value::String(path.to_string()));
        }
        sources
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# kindle-send configuration

[mail]
# Address documents are sent from
sender = ""
# Address of your device (e.g. name@kindle.com)
receiver = ""
# Local MTA used for delivery; invoked as `<command> -t -oi`
sendmail_command = "sendmail"

[daemon]
# The daemon refuses to start until this is true
enabled = false

# Bookmark file, or directory of bookmark files, to monitor.
# One URL per line; blank lines and lines starting with '#' are ignored.
bookmark_path = ""

# How often to check for new bookmarks
check_interval_minutes = 15

# Defaults live next to this file:
# log_path = "~/.config/kindle-send/kindle-send.log"
# pid_file = "~/.config/kindle-send/kindle-send.pid"
# state_path = "~/.config/kindle-send/processed_bookmarks.json"

[output]
# Where generated documents are written (default: system temp dir)
# store_path = "/home/me/Documents/kindle"

# Maximum concurrent page downloads
fetch_workers = 10

[extractor]
# Minimum text length for a content selector to win
min_content_length = 100

# CSS selectors to try for article content extraction (in priority order)
content_selectors = [
    "article",
    "[role=\"main\"]",
    "main",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "#content",
    ".post",
    ".article",
]

# Elements to remove before extraction (ads, navigation, etc.)
remove_selectors = [
    "nav",
    "header",
    "footer",
    "aside",
    ".sidebar",
    ".advertisement",
    ".ad",
    ".ads",
    ".social-share",
    ".comments",
    "script",
    "style",
]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert!(!config.daemon.enabled);
        assert_eq!(config.daemon.check_interval_minutes, 15);
        assert_eq!(config.mail.sendmail_command, "sendmail");
        assert_eq!(config.extractor.content_selectors[0], "article");
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[daemon]
enabled = true
bookmark_path = "/tmp/bookmarks.txt"
pid_file = "/tmp/ks/kindle-send.pid"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        let settings = config.daemon_settings().unwrap();
        assert!(settings.enabled);
        assert_eq!(
            settings.bookmark_path,
            Some(PathBuf::from("/tmp/bookmarks.txt"))
        );
        assert_eq!(settings.check_interval, Duration::from_secs(15 * 60));
        assert_eq!(
            config.state_path().unwrap(),
            PathBuf::from("/tmp/ks/processed_bookmarks.json")
        );
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");

        assert!(!config.daemon.enabled);
        assert!(config.daemon.bookmark_path.is_empty());
        assert!(config.sources.is_empty());
        assert_eq!(config.output.fetch_workers, 10);
    }

    #[test]
    fn test_blank_bookmark_path_is_unset() {
        let content = r#"
[daemon]
bookmark_path = "   "
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.daemon_settings().unwrap().bookmark_path, None);
        assert!(!config.source_settings().contains_key("file"));
    }

    #[test]
    fn test_bookmark_path_feeds_file_source() {
        let content = r#"
[daemon]
bookmark_path = "/data/bookmarks"

[sources.remote]
token = "abc"
"#;
        let config: Config = toml::from_str(content).unwrap();
        let sources = config.source_settings();

        assert_eq!(
            sources["file"].get("path").and_then(|v| v.as_str()),
            Some("/data/bookmarks")
        );
        assert_eq!(
            sources["remote"].get("token").and_then(|v| v.as_str()),
            Some("abc")
        );
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[daemon\nenabled = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let content = format!("[daemon]\ncheck_interval_minutes = {}\n", u64::MAX / 2);
        let config: Config = toml::from_str(&content).unwrap();
        let settings = config.daemon_settings().unwrap();
        assert_eq!(settings.check_interval, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
