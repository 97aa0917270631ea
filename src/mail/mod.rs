mod sendmail;

pub use sendmail::{build_message, SendmailMailer};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;

/// Fallback send timeout, and the floor for any configured one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MIN_TIMEOUT_SECS: u64 = 60;

/// Send timeout for a poll interval: the interval, but never under a minute.
pub fn timeout_for_interval(interval: Duration) -> u64 {
    interval.as_secs().max(MIN_TIMEOUT_SECS)
}

/// Delivers documents to the destination device.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Attach every existing file and send them in one message.
    ///
    /// Missing files are skipped; it is an error if none can be attached.
    async fn send(&self, files: &[PathBuf], timeout_secs: u64) -> Result<()>;
}
