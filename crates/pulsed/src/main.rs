//! pulsed: the Pulse monitor daemon.
//!
//! Probes a fixed list of URLs on a timer and posts a chat alert only
//! when a target's health flips. Status survives restarts in an external
//! key-value store.
//!
//! # Usage
//!
//! ```text
//! pulsed --config pulse.toml serve
//! pulsed --config pulse.toml run-once --past-due
//! pulsed --config pulse.toml status
//! ```
//!
//! `SLACK_TOKEN`, `SLACK_CHANNEL_ID` and `STATUS_STORE_CONNECTION_STRING`
//! may be given in the environment instead of flags.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use pulse_core::PulseConfig;
use pulse_health::RunTrigger;

mod app;
mod scheduler;

use app::Secrets;
use scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "pulsed", about = "Pulse URL monitor daemon", version)]
struct Cli {
    /// Path to pulse.toml.
    #[arg(long, global = true, default_value = "pulse.toml")]
    config: PathBuf,

    /// Chat API bot token.
    #[arg(long, global = true, env = "SLACK_TOKEN", hide_env_values = true)]
    slack_token: Option<String>,

    /// Channel that receives alerts.
    #[arg(long, global = true, env = "SLACK_CHANNEL_ID")]
    slack_channel: Option<String>,

    /// Status store connection string (`Endpoint=...;Id=...;Secret=...` or `redb:<path>`).
    #[arg(long, global = true, env = "STATUS_STORE_CONNECTION_STRING", hide_env_values = true)]
    store: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run on the configured interval until Ctrl-C.
    Serve,
    /// Run once and exit (for an external scheduler).
    RunOnce {
        /// The caller's timer fired late.
        #[arg(long)]
        past_due: bool,
    },
    /// Print the persisted status of every target.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,pulsed=debug,pulse_health=debug".into());
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    let config = PulseConfig::from_file(&cli.config)?;
    let secrets = Secrets {
        slack_token: cli.slack_token,
        slack_channel: cli.slack_channel,
        store: cli.store,
    };

    match cli.command {
        Command::Serve => serve(&config, &secrets).await,
        Command::RunOnce { past_due } => {
            let orchestrator = app::build_orchestrator(&config, &secrets)?;
            orchestrator.run(RunTrigger { past_due }).await;
            Ok(())
        }
        Command::Status => {
            for line in app::status_lines(&config, &secrets).await? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn serve(config: &PulseConfig, secrets: &Secrets) -> anyhow::Result<()> {
    info!("pulse daemon starting");

    let orchestrator = app::build_orchestrator(config, secrets)?;
    let scheduler = Scheduler::new(
        orchestrator,
        config.schedule.interval(),
        config.schedule.late_tolerance(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // An in-flight run finishes before the loop sees the signal.
    handle.await?;

    info!("pulse daemon stopped");
    Ok(())
}
