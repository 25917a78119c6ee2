use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use upwatch::config::{self, SchedulerSettings};
use upwatch::evaluator::StatusEvaluator;
use upwatch::events::EventBroadcaster;
use upwatch::notifications::{LogDispatcher, NotificationDispatcher, WebhookSender};
use upwatch::probes::ProbeRegistry;
use upwatch::repository::{
    CheckRepository, MemoryCheckRepository, MemoryMonitorRepository, MonitorRepository,
};
use upwatch::runner::CheckRunner;
use upwatch::scheduler::Scheduler;

#[derive(Parser, Debug)]
#[command(name = "upwatch", version, about = "Periodic endpoint availability prober")]
struct Cli {
    /// Path to the TOML file with monitor definitions.
    #[arg(short, long, default_value = "upwatch.toml")]
    config: PathBuf,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "upwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` level if RUST_LOG is not set.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let settings = SchedulerSettings::from_env()?;
    let monitors = match config::load_monitors(&cli.config) {
        Ok(monitors) => monitors,
        Err(e) => {
            error!(path = %cli.config.display(), error = %e, "failed to load monitor config");
            return Err(e.into());
        }
    };
    info!(
        count = monitors.len(),
        path = %cli.config.display(),
        "loaded monitor definitions"
    );

    let monitor_repo = Arc::new(MemoryMonitorRepository::new());
    for monitor in monitors {
        monitor_repo.insert(monitor);
    }
    let check_repo: Arc<dyn CheckRepository> = Arc::new(MemoryCheckRepository::new());

    let dispatcher: Arc<dyn NotificationDispatcher> = match std::env::var("UPWATCH_WEBHOOK_URL") {
        Ok(url) if !url.trim().is_empty() => Arc::new(WebhookSender::new(url)?),
        _ => Arc::new(LogDispatcher::new()),
    };

    let events = EventBroadcaster::new(256);
    let evaluator = Arc::new(StatusEvaluator::new(
        Arc::clone(&monitor_repo) as Arc<dyn MonitorRepository>,
        check_repo,
        dispatcher,
        events,
    ));
    let runner = Arc::new(CheckRunner::new(
        ProbeRegistry::with_defaults(&settings.user_agent),
        settings.retry_attempts,
        settings.retry_backoff,
    ));

    let scheduler = Arc::new(Scheduler::new(
        settings,
        monitor_repo as Arc<dyn MonitorRepository>,
        runner,
        evaluator,
    ));
    let loop_handle = Arc::clone(&scheduler).start();
    info!("upwatch started, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.shutdown().await;
    // The scan loop exits right after the shutdown signal; don't wait on it
    // forever if something went sideways.
    let _ = tokio::time::timeout(Duration::from_secs(5), loop_handle).await;

    info!("upwatch stopped");
    Ok(())
}
