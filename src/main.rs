//! slirc-bot binary entry point.
//!
//! `slirc-bot [CHANNEL] [LOGLEVEL]` connects, joins the channel, runs
//! the session loop until it stops, and exits with a code describing
//! why: 0 clean stop, 1 startup failure, 2 connection lost.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slirc_bot::config::{self, BotConfig, CliArgs, OverrideFlags};
use slirc_bot::dispatch::{Dispatcher, LoggingHooks};
use slirc_bot::{
    AccessPolicy, DayLogs, FileCommandStore, SessionConnection, StopReason,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse(std::env::args().skip(1));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config::level_filter(args.log_level.as_deref()).into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    match run(args).await {
        Ok(reason) => {
            info!(%reason, "bot stopped");
            match reason {
                StopReason::ConnectionLost => ExitCode::from(2),
                _ => ExitCode::SUCCESS,
            }
        }
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::from(1)
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<StopReason> {
    let config = BotConfig::load(CONFIG_PATH)?;
    let channel = config::normalize_channel(
        args.channel.as_deref().unwrap_or(&config.settings.channel),
    );
    let flags = OverrideFlags::load(&config.paths.local_override);
    if flags.silence {
        info!("silence flag set: every outbound send is suppressed");
    }

    let ignore = config::load_ignore_list(&config.paths.ignore);
    let policy = AccessPolicy::new(&channel, config.access.owners.clone());
    let router = FileCommandStore::load(
        config
            .paths
            .commands
            .join(format!("{}.toml", channel.trim_start_matches('#'))),
    )?;
    info!(channel = %channel, commands = router.len(), "loaded command store");

    let logs = DayLogs::open(&config.paths.logs, &channel, chrono::Utc::now().date_naive())?;
    let session = SessionConnection::connect(&config, &channel, &flags).await?;

    let mut dispatcher = Dispatcher::new(session, router, LoggingHooks, policy, ignore, logs);

    let reason = tokio::select! {
        result = dispatcher.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            StopReason::Interrupted
        }
    };
    Ok(reason)
}
