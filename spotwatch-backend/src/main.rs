use spotwatch_backend::config;
use spotwatch_backend::module::admin::{AdminState, start_admin_server};
use spotwatch_backend::module::callsign::CallsignStore;
use spotwatch_backend::module::feeds::{BeaconFeed, PotaFeed, SpotFeed};
use spotwatch_backend::module::poller::SpotPoller;
use spotwatch_backend::module::schedule::{Dispatcher, ScheduleStore};
use spotwatch_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use spotwatch_backend::module::sink::{DiscordWebhookSink, LogSink, NotificationSink};
use spotwatch_backend::module::stats::{PotaStatsClient, StatsCache};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::read_config(&config_path)?;

    // Initialize logging
    let _logging_guard = spotwatch_backend::logging::init_logging(
        &config.log_dir,
        "spotwatch-backend",
        &config.log_level,
        config.log_retention_days,
    )?;

    tracing::info!("Spotwatch backend starting...");

    let callsigns = Arc::new(CallsignStore::new(&config.callsign_file));
    let schedule = Arc::new(ScheduleStore::new(&config.schedule_file));
    tracing::info!(
        "Tracking {} callsigns from {}, schedule from {}",
        callsigns.list().await?.len(),
        config.callsign_file,
        config.schedule_file
    );

    let timeout = Duration::from_secs(config.feeds.request_timeout_secs);
    let primary: Arc<dyn SpotFeed> = Arc::new(PotaFeed::new(&config.feeds.primary_url, timeout)?);
    let secondary: Option<Arc<dyn SpotFeed>> = if config.feeds.secondary_url.is_empty() {
        tracing::info!("Secondary feed disabled");
        None
    } else {
        Some(Arc::new(BeaconFeed::new(
            &config.feeds.secondary_url,
            timeout,
            Duration::from_millis(config.feeds.secondary_pacing_ms),
        )?))
    };

    let stats = Arc::new(StatsCache::new(
        Arc::new(PotaStatsClient::new(&config.stats.url, timeout)?),
        chrono::Duration::hours(config.stats.ttl_hours),
    ));

    let sink: Arc<dyn NotificationSink> = if config.sink.webhook_url.is_empty() {
        tracing::warn!("No webhook configured, notifications will only be logged");
        Arc::new(LogSink)
    } else {
        Arc::new(DiscordWebhookSink::new(&config.sink)?)
    };

    let admin_handle = if config.admin.enable {
        let state = Arc::new(AdminState {
            callsigns: callsigns.clone(),
            schedule: schedule.clone(),
            token: config.admin.token.clone(),
        });
        let addr = config.admin_address();
        Some(tokio::spawn(async move {
            if let Err(e) = start_admin_server(state, addr).await {
                tracing::error!("Admin server stopped: {:#}", e);
            }
        }))
    } else {
        None
    };

    // Configure and start scheduled tasks
    let task_config = ScheduledTaskConfig {
        spot_poll_interval_secs: config.poll.spot_interval_secs,
        perform_initial_poll: config.poll.perform_initial_poll,
    };
    let poller = SpotPoller::new(primary, secondary, callsigns, stats, sink.clone(), timeout);
    let dispatcher = Dispatcher::new(schedule);

    let mut task_manager = ScheduledTaskManager::new(task_config, poller, dispatcher, sink);
    task_manager.start_all().await?;
    tracing::info!("All scheduled tasks started successfully");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    task_manager.shutdown().await;
    if let Some(handle) = admin_handle {
        handle.abort();
    }

    Ok(())
}
