pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::mail::DEFAULT_TIMEOUT_SECS;

#[derive(Parser)]
#[command(name = "kindle-send")]
#[command(about = "Send web pages and bookmarks to your Kindle", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/kindle-send/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert and mail URLs, URL list files or book files once
    Send {
        /// URLs, files containing URLs, or .mobi/.pdf/.epub/.azw3/.txt files
        #[arg(required = true)]
        items: Vec<String>,

        /// Mail timeout in seconds (minimum 60)
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        mail_timeout: u64,
    },
    /// Convert URLs or URL list files into documents without mailing them
    Download {
        /// URLs, files containing URLs, or .mobi/.pdf/.epub/.azw3/.txt files
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Background daemon that watches bookmark sources
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Show the config file location and effective daemon settings
    Config,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in the foreground
    Start {
        /// Check interval (e.g., "1h", "30m", "90s", "1d"); overrides the config file
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
    /// Stop the daemon if it is running, then start it
    Restart {
        /// Check interval (e.g., "1h", "30m", "90s", "1d"); overrides the config file
        #[arg(short, long)]
        interval: Option<String>,
    },
}

impl Commands {
    /// Whether this command runs the daemon loop and so logs to the log file.
    pub fn runs_daemon(&self) -> bool {
        matches!(
            self,
            Commands::Daemon {
                action: DaemonAction::Start { .. } | DaemonAction::Restart { .. }
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(["kindle-send", "send", "https://a.com", "list.txt"]);
        match cli.command {
            Commands::Send {
                items,
                mail_timeout,
            } => {
                assert_eq!(items, vec!["https://a.com", "list.txt"]);
                assert_eq!(mail_timeout, DEFAULT_TIMEOUT_SECS);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::parse_from(["kindle-send", "download", "https://a.com"]);
        assert!(!cli.command.runs_daemon());
        match cli.command {
            Commands::Download { items } => assert_eq!(items, vec!["https://a.com"]),
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_send_requires_items() {
        assert!(Cli::try_parse_from(["kindle-send", "send"]).is_err());
    }

    #[test]
    fn test_parse_daemon_start_with_global_config() {
        let cli = Cli::parse_from([
            "kindle-send",
            "daemon",
            "start",
            "--interval",
            "30m",
            "-c",
            "/etc/kindle-send.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/kindle-send.toml")));
        assert!(cli.command.runs_daemon());
        match cli.command {
            Commands::Daemon {
                action: DaemonAction::Start { interval },
            } => assert_eq!(interval.as_deref(), Some("30m")),
            _ => panic!("expected daemon start"),
        }
    }

    #[test]
    fn test_status_does_not_run_daemon() {
        let cli = Cli::parse_from(["kindle-send", "daemon", "status"]);
        assert!(!cli.command.runs_daemon());
    }
}
