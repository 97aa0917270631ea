use std::path::PathBuf;
use std::time::Duration;

use crate::app::{AppContext, KindleError, Result};
use crate::config::{Config, DaemonSettings};
use crate::daemon::{self, format_interval, parse_interval, stop_timeout, DaemonStatus};
use crate::logging::LogGuard;
use crate::mail::MIN_TIMEOUT_SECS;

/// Classify and convert `items`, returning the produced files.
async fn prepare(ctx: &AppContext, items: &[String]) -> Result<Vec<PathBuf>> {
    let requests = ctx.pipeline.classify(items);
    if requests.is_empty() {
        return Err(KindleError::Other(
            "nothing to do: expected URLs, URL list files or book files".into(),
        ));
    }
    println!("Preparing {} item(s)...", requests.len());

    let documents = ctx.pipeline.queue(requests).await;
    if documents.is_empty() {
        return Err(KindleError::Conversion("no documents were produced".into()));
    }
    Ok(documents)
}

/// Convert `items` and leave the documents on disk without mailing them.
pub async fn download(ctx: &AppContext, items: &[String]) -> Result<Vec<PathBuf>> {
    let documents = prepare(ctx, items).await?;

    println!("Downloaded {} file(s):", documents.len());
    for (idx, path) in documents.iter().enumerate() {
        println!("{}. {}", idx + 1, path.display());
    }
    Ok(documents)
}

pub async fn send(ctx: &AppContext, items: &[String], mail_timeout: u64) -> Result<()> {
    let documents = prepare(ctx, items).await?;

    let timeout = mail_timeout.max(MIN_TIMEOUT_SECS);
    ctx.mailer.send(&documents, timeout).await?;
    println!(
        "Sent {} document(s) to {}",
        documents.len(),
        ctx.config.mail.receiver
    );
    Ok(())
}

fn interval_override(interval: Option<&str>) -> Result<Option<Duration>> {
    interval
        .map(|s| {
            parse_interval(s)
                .map(Duration::from_secs)
                .map_err(KindleError::ConfigInvalid)
        })
        .transpose()
}

pub async fn start_daemon(
    ctx: &AppContext,
    interval: Option<&str>,
    log_guard: Option<LogGuard>,
) -> Result<()> {
    let settings = ctx.daemon_settings(interval_override(interval)?)?;
    println!(
        "Starting daemon (interval: {}, PID: {})",
        format_interval(settings.check_interval.as_secs()),
        std::process::id()
    );

    ctx.daemon(settings, log_guard).run().await?;
    println!("Daemon stopped");
    Ok(())
}

pub async fn stop_daemon(ctx: &AppContext) -> Result<()> {
    let settings = ctx.daemon_settings(None)?;
    let pid = daemon::stop_daemon(&settings.pid_file, stop_timeout(settings.check_interval)).await?;
    println!("Daemon stopped (PID {})", pid);
    Ok(())
}

pub fn daemon_status(ctx: &AppContext) -> Result<()> {
    let settings = ctx.daemon_settings(None)?;
    let status = daemon::daemon_status(&settings.pid_file);

    match status {
        DaemonStatus::Running { pid } => println!("Daemon is running (PID: {})", pid),
        DaemonStatus::Stale { pid } => {
            println!("Daemon is not running (stale PID file for {})", pid)
        }
        DaemonStatus::NotRunning => println!("Daemon is not running"),
    }
    print_schedule(&settings);
    let store = ctx.open_store();
    match store.last_check() {
        Some(at) => println!("  Last check:     {}", at.to_rfc3339()),
        None => println!("  Last check:     never"),
    }
    println!("  Processed:      {}", store.len());

    if status.is_running() {
        Ok(())
    } else {
        Err(KindleError::NotRunning)
    }
}

pub async fn restart_daemon(
    ctx: &AppContext,
    interval: Option<&str>,
    log_guard: Option<LogGuard>,
) -> Result<()> {
    let settings = ctx.daemon_settings(None)?;
    if daemon::daemon_status(&settings.pid_file).is_running() {
        stop_daemon(ctx).await?;
    }
    start_daemon(ctx, interval, log_guard).await
}

pub fn show_config(ctx: &AppContext) -> Result<()> {
    let path = match &ctx.config_path {
        Some(p) => p.clone(),
        None => Config::default_config_path()?,
    };
    println!("Config file: {}", path.display());

    let settings = ctx.daemon_settings(None)?;
    println!("Daemon:");
    println!("  Enabled:        {}", settings.enabled);
    print_schedule(&settings);
    println!("  Log file:       {}", settings.log_path.display());
    println!("  State file:     {}", ctx.config.state_path()?.display());
    println!("Mail:");
    println!("  From:           {}", ctx.config.mail.sender);
    println!("  To:             {}", ctx.config.mail.receiver);
    println!("  Command:        {}", ctx.config.mail.sendmail_command);
    println!("Output:           {}", ctx.config.store_path().display());

    let sources = ctx.registry.names();
    println!("Sources:");
    for name in sources {
        let enabled = ctx
            .registry
            .get(&name)
            .map(|s| s.is_enabled())
            .unwrap_or(false);
        println!(
            "  {:<15} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

fn print_schedule(settings: &DaemonSettings) {
    println!(
        "  Interval:       {}",
        format_interval(settings.check_interval.as_secs())
    );
    match &settings.bookmark_path {
        Some(path) => println!("  Bookmarks:      {}", path.display()),
        None => println!("  Bookmarks:      (not set)"),
    }
    println!("  PID file:       {}", settings.pid_file.display());
}
