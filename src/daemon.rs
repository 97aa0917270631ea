//! Background daemon that polls bookmark sources on an interval.
//!
//! Runs in the foreground; use a supervisor or `nohup` to detach it.
//! A PID file guards against two instances sharing the same state, and
//! `kindle-send daemon stop` reaches a running instance through `SIGTERM`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{KindleError, Result};
use crate::config::DaemonSettings;
use crate::logging::LogGuard;
use crate::mail::timeout_for_interval;
use crate::processor::{BookmarkProcessor, CycleOutcome};

/// Time allowed for shutdown once the current cycle has finished
pub const STOP_GRACE: Duration = Duration::from_secs(10);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Longest accepted check interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 86400);

/// Parse interval string like "1h", "30m", "6h", "1d"
pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().to_lowercase();

    if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map(|h| h * 3600)
            .map_err(|_| format!("Invalid hours: {}", hours))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid minutes: {}", minutes))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map(|d| d * 86400)
            .map_err(|_| format!("Invalid days: {}", days))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        // bare number means minutes, like check_interval_minutes
        s.parse::<u64>()
            .map(|m| m * 60)
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
    }
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// How long `stop` should wait for a daemon polling every `check_interval`.
///
/// A signal is only handled between cycles, so this covers a mail send
/// that is already in flight.
pub fn stop_timeout(check_interval: Duration) -> Duration {
    Duration::from_secs(timeout_for_interval(check_interval)) + STOP_GRACE
}

/// Lifecycle of one daemon run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Validating,
    Running,
    Stopped,
}

/// On-disk record of the running daemon's process id.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// PID recorded in the file. Missing or garbled files read as `None`.
    pub fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
    }

    /// PID in the file, if that process is still alive.
    pub fn live_pid(&self) -> Option<u32> {
        self.read().filter(|&pid| process_exists(pid))
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        writeln!(file, "{}", pid)?;
        Ok(())
    }

    pub fn remove(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to remove PID file: {}", e);
            }
        }
    }
}

#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    use std::process::Command;
    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(KindleError::Other(format!(
            "Failed to signal daemon (PID {})",
            pid
        )))
    }
}

#[cfg(windows)]
fn send_terminate(pid: u32) -> Result<()> {
    use std::process::Command;
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(KindleError::Other(format!(
            "Failed to stop daemon (PID {})",
            pid
        )))
    }
}

#[cfg(unix)]
struct TerminationSignals {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.int.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}

/// Daemon runner
pub struct Daemon {
    settings: DaemonSettings,
    processor: Arc<BookmarkProcessor>,
    pid_file: PidFile,
    cancel: CancellationToken,
    state: watch::Sender<DaemonState>,
    log_guard: Mutex<Option<LogGuard>>,
}

impl Daemon {
    pub fn new(settings: DaemonSettings, processor: Arc<BookmarkProcessor>) -> Self {
        let pid_file = PidFile::new(&settings.pid_file);
        let (state, _) = watch::channel(DaemonState::Idle);
        Self {
            settings,
            processor,
            pid_file,
            cancel: CancellationToken::new(),
            state,
            log_guard: Mutex::new(None),
        }
    }

    /// Hand over the log file guard; it is released as the last shutdown step.
    pub fn with_log_guard(self, guard: Option<LogGuard>) -> Self {
        *self.log_guard.lock().unwrap_or_else(PoisonError::into_inner) = guard;
        self
    }

    pub fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    pub fn processor(&self) -> &Arc<BookmarkProcessor> {
        &self.processor
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Ask a running loop to shut down. Takes effect between cycles.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn transition(&self, next: DaemonState) {
        debug!(state = ?next, "Daemon state");
        self.state.send_replace(next);
    }

    fn validate(&self) -> Result<()> {
        if !self.settings.enabled {
            return Err(KindleError::ConfigInvalid(
                "daemon is not enabled; set daemon.enabled = true".into(),
            ));
        }
        if self.settings.bookmark_path.is_none() && !self.processor.has_enabled_sources() {
            return Err(KindleError::ConfigInvalid(
                "no bookmark path or enabled source configured".into(),
            ));
        }
        if self.settings.check_interval.is_zero() {
            return Err(KindleError::ConfigInvalid(
                "check interval must be greater than zero".into(),
            ));
        }
        if self.settings.check_interval > MAX_INTERVAL {
            return Err(KindleError::ConfigInvalid(format!(
                "check interval must be at most {}",
                format_interval(MAX_INTERVAL.as_secs())
            )));
        }
        if let Some(pid) = self.pid_file.live_pid() {
            return Err(KindleError::AlreadyRunning { pid });
        }
        Ok(())
    }

    /// Run the daemon until a termination signal or [`Daemon::stop`].
    pub async fn run(&self) -> Result<()> {
        self.transition(DaemonState::Validating);
        if let Err(e) = self.validate() {
            self.transition(DaemonState::Idle);
            return Err(e);
        }

        if let Some(stale) = self.pid_file.read() {
            info!(pid = stale, "Replacing stale PID file");
        }
        if let Err(e) = self.pid_file.write(std::process::id()) {
            self.transition(DaemonState::Idle);
            return Err(e);
        }

        let result = self.event_loop().await;
        self.shutdown();
        result
    }

    async fn event_loop(&self) -> Result<()> {
        let mut signals = TerminationSignals::register()?;

        let mut timer = interval(self.settings.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // Skip the first immediate tick

        self.transition(DaemonState::Running);
        info!(
            pid = std::process::id(),
            interval = %format_interval(self.settings.check_interval.as_secs()),
            bookmark_path = ?self.settings.bookmark_path,
            "kindle-send daemon started"
        );

        info!("Running initial check");
        self.run_cycle().await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Stop requested");
                    break;
                }
                signal = signals.recv() => {
                    info!(signal, "Received termination signal");
                    break;
                }
                _ = timer.tick() => {
                    info!("Running scheduled check");
                    self.run_cycle().await;
                }
            }
        }

        Ok(())
    }

    async fn run_cycle(&self) {
        let start = Instant::now();
        let outcome = self.processor.run_cycle().await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            CycleOutcome::Delivered { new, documents, .. } => {
                info!(new, documents, elapsed_secs = elapsed, "Check complete")
            }
            ref soft if soft.is_soft_failure() => {
                warn!(outcome = ?soft, elapsed_secs = elapsed, "Check produced nothing to send")
            }
            _ => debug!(elapsed_secs = elapsed, "Check complete"),
        }
    }

    fn shutdown(&self) {
        info!("Daemon shutting down");
        if self.pid_file.read() == Some(std::process::id()) {
            self.pid_file.remove();
        }
        self.transition(DaemonState::Stopped);
        self.log_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// What the PID file says about the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running { pid: u32 },
    /// The file names a process that is gone
    Stale { pid: u32 },
    NotRunning,
}

impl DaemonStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, DaemonStatus::Running { .. })
    }
}

/// Check daemon status without touching the PID file.
pub fn daemon_status(pid_file: &Path) -> DaemonStatus {
    match PidFile::new(pid_file).read() {
        Some(pid) if process_exists(pid) => DaemonStatus::Running { pid },
        Some(pid) => DaemonStatus::Stale { pid },
        None => DaemonStatus::NotRunning,
    }
}

/// Stop a running daemon by signalling the PID in its PID file, then wait
/// for the file to disappear. Returns the stopped PID.
pub async fn stop_daemon(pid_file: &Path, timeout: Duration) -> Result<u32> {
    let marker = PidFile::new(pid_file);

    let pid = match daemon_status(pid_file) {
        DaemonStatus::Running { pid } => pid,
        DaemonStatus::Stale { pid } => {
            warn!(pid, "Removing stale PID file");
            marker.remove();
            return Err(KindleError::NotRunning);
        }
        DaemonStatus::NotRunning => return Err(KindleError::NotRunning),
    };

    info!(pid, "Sending termination signal");
    send_terminate(pid)?;

    let deadline = Instant::now() + timeout;
    while marker.exists() {
        if !process_exists(pid) {
            // died without cleaning up
            marker.remove();
            break;
        }
        if Instant::now() >= deadline {
            return Err(KindleError::Other(format!(
                "daemon (PID {}) did not stop within {}s; it may still be finishing a cycle",
                pid,
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }

    Ok(pid)
}
