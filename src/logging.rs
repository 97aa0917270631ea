//! Tracing bootstrap.
//!
//! Every command logs to stdout. Daemon runs additionally append to the
//! configured log file through a non-blocking writer; the returned
//! [`LogGuard`] must be kept alive for as long as file output is wanted.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::Result;

/// Flushes and closes the log file when dropped.
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init(log_file: Option<&Path>) -> Result<Option<LogGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init()
            .map_err(|e| crate::app::KindleError::Other(e.to_string()))?;
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .try_init()
        .map_err(|e| crate::app::KindleError::Other(e.to_string()))?;

    Ok(Some(LogGuard { _guard: guard }))
}
