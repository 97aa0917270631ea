use clap::Parser;

use kindle_send::app::AppContext;
use kindle_send::cli::{commands, Cli, Commands, DaemonAction};
use kindle_send::config::Config;
use kindle_send::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Daemon runs also log to the configured file
    let log_file = if cli.command.runs_daemon() {
        Some(config.daemon_settings()?.log_path)
    } else {
        None
    };
    let log_guard = logging::init(log_file.as_deref())?;

    let ctx = AppContext::new(config, cli.config.clone())?;

    match cli.command {
        Commands::Send {
            items,
            mail_timeout,
        } => {
            commands::send(&ctx, &items, mail_timeout).await?;
        }
        Commands::Download { items } => {
            commands::download(&ctx, &items).await?;
        }
        Commands::Daemon { action } => match action {
            DaemonAction::Start { interval } => {
                commands::start_daemon(&ctx, interval.as_deref(), log_guard).await?;
            }
            DaemonAction::Stop => {
                commands::stop_daemon(&ctx).await?;
            }
            DaemonAction::Status => {
                commands::daemon_status(&ctx)?;
            }
            DaemonAction::Restart { interval } => {
                commands::restart_daemon(&ctx, interval.as_deref(), log_guard).await?;
            }
        },
        Commands::Config => {
            commands::show_config(&ctx)?;
        }
    }

    Ok(())
}
