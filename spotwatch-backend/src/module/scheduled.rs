///! Scheduled task manager - Centralize all periodic tasks
///!
///! This module manages the two background loops:
///! - Spot polling (fixed interval, default 60s)
///! - Scheduled messages (aligned to the top of each UTC minute)

use super::poller::SpotPoller;
use super::schedule::Dispatcher;
use super::sink::NotificationSink;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Interval between spot polls (in seconds)
    pub spot_poll_interval_secs: u64,

    /// Poll immediately instead of waiting one interval
    pub perform_initial_poll: bool,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            spot_poll_interval_secs: 60,
            perform_initial_poll: true,
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    poller: Option<SpotPoller>,
    dispatcher: Option<Dispatcher>,
    sink: Arc<dyn NotificationSink>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(
        config: ScheduledTaskConfig,
        poller: SpotPoller,
        dispatcher: Dispatcher,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            poller: Some(poller),
            dispatcher: Some(dispatcher),
            sink,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        tracing::info!("Starting scheduled task manager...");

        let poller = self
            .poller
            .take()
            .ok_or_else(|| anyhow::anyhow!("Spot poll task already started"))?;
        let poll_handle = self.start_spot_poll_task(poller);
        self.task_handles.push(poll_handle);

        let dispatcher = self
            .dispatcher
            .take()
            .ok_or_else(|| anyhow::anyhow!("Schedule task already started"))?;
        let schedule_handle = self.start_schedule_task(dispatcher);
        self.task_handles.push(schedule_handle);

        tracing::info!(
            "Started {} scheduled tasks (spot poll every {}s, schedule every minute)",
            self.task_handles.len(),
            self.config.spot_poll_interval_secs
        );

        Ok(())
    }

    fn start_spot_poll_task(&self, mut poller: SpotPoller) -> JoinHandle<()> {
        let interval_secs = self.config.spot_poll_interval_secs.max(1);
        let perform_initial = self.config.perform_initial_poll;

        tracing::info!(
            "Scheduling spot poll task (interval: {}s, initial: {})",
            interval_secs,
            perform_initial
        );

        tokio::spawn(async move {
            let period = Duration::from_secs(interval_secs);
            let mut ticker = if perform_initial {
                tokio::time::interval(period)
            } else {
                tokio::time::interval_at(tokio::time::Instant::now() + period, period)
            };
            // A slow tick delays the next one rather than bunching them up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = poller.poll_once(Utc::now()).await;
                if report.skipped {
                    tracing::warn!("Spot poll skipped");
                } else {
                    tracing::info!(
                        "Spot poll: {} fetched, {} tracked, {} notified, {} expired",
                        report.fetched,
                        report.matched,
                        report.notified,
                        report.expired
                    );
                }
            }
        })
    }

    fn start_schedule_task(&self, mut dispatcher: Dispatcher) -> JoinHandle<()> {
        let sink = self.sink.clone();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next_trigger = Self::calculate_next_minute(now);
                let sleep_duration = (next_trigger - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(sleep_duration).await;

                // Never evaluate the minute we were aiming past.
                let now = Utc::now().max(next_trigger);
                Self::run_schedule_tick(&mut dispatcher, sink.as_ref(), now).await;
            }
        })
    }

    async fn run_schedule_tick(
        dispatcher: &mut Dispatcher,
        sink: &dyn NotificationSink,
        now: DateTime<Utc>,
    ) -> usize {
        let due = dispatcher.tick(now).await;
        let mut sent = 0;
        for entry in &due {
            match sink.send_scheduled(entry).await {
                Ok(()) => {
                    tracing::info!("Sent scheduled message '{}'", entry.name);
                    sent += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to send scheduled message '{}': {:#}", entry.name, e)
                }
            }
        }
        sent
    }

    /// Start of the next UTC minute
    fn calculate_next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
        let minute = now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now);
        minute + TimeDelta::minutes(1)
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
