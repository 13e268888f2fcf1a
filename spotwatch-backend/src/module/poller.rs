///! One spot-poll tick
///!
///! tracked list (once, under its lock) -> both feeds concurrently -> filter
///! by base callsign -> sequential dedup -> notify -> expire.

use chrono::{DateTime, Utc};
use spotwatch_common::SpotRecord;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::callsign::CallsignStore;
use super::feeds::SpotFeed;
use super::sink::NotificationSink;
use super::spot::SpotTracker;
use super::stats::StatsCache;

/// Summary of one tick, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub matched: usize,
    pub notified: usize,
    pub expired: usize,
    /// The tick was abandoned before evaluation
    pub skipped: bool,
}

pub struct SpotPoller {
    primary: Arc<dyn SpotFeed>,
    secondary: Option<Arc<dyn SpotFeed>>,
    callsigns: Arc<CallsignStore>,
    stats: Arc<StatsCache>,
    sink: Arc<dyn NotificationSink>,
    tracker: SpotTracker,
    fetch_timeout: Duration,
}

impl SpotPoller {
    pub fn new(
        primary: Arc<dyn SpotFeed>,
        secondary: Option<Arc<dyn SpotFeed>>,
        callsigns: Arc<CallsignStore>,
        stats: Arc<StatsCache>,
        sink: Arc<dyn NotificationSink>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            callsigns,
            stats,
            sink,
            tracker: SpotTracker::new(),
            fetch_timeout,
        }
    }

    pub fn tracker(&self) -> &SpotTracker {
        &self.tracker
    }

    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> PollReport {
        let mut report = PollReport::default();

        let tracked = match self.callsigns.list().await {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!("Failed to read tracked callsigns: {}", e);
                report.skipped = true;
                return report;
            }
        };

        let Some(spots) = self.fetch_all(&tracked).await else {
            report.skipped = true;
            return report;
        };
        report.fetched = spots.len();

        let tracked: HashSet<String> = tracked.into_iter().collect();
        for spot in spots
            .iter()
            .filter(|s| tracked.contains(&s.base_identifier().to_uppercase()))
        {
            report.matched += 1;

            let change = self.tracker.classify(spot, now);
            debug!("{} on {} {}: {}", spot.identifier, spot.raw_frequency, spot.mode, change);
            if !change.should_notify() {
                continue;
            }

            let stats = self.stats.lookup(&spot.identifier).await;
            match self.sink.send_spot(spot, change, &stats).await {
                Ok(()) => {
                    info!("Notified {} ({})", spot.identifier, change);
                    report.notified += 1;
                }
                Err(e) => warn!("Failed to send notification for {}: {:#}", spot.identifier, e),
            }
        }

        report.expired = self.tracker.expire(now);
        report
    }

    /// Primary and secondary run concurrently. `None` when the primary fails,
    /// which abandons the tick.
    async fn fetch_all(&self, tracked: &[String]) -> Option<Vec<SpotRecord>> {
        let primary = tokio::time::timeout(self.fetch_timeout, self.primary.fetch(tracked));
        let secondary = async {
            match &self.secondary {
                Some(feed) => feed.fetch(tracked).await,
                None => Ok(Vec::new()),
            }
        };

        let (primary, secondary) = futures::future::join(primary, secondary).await;

        let mut spots = match primary {
            Ok(Ok(spots)) => spots,
            Ok(Err(e)) => {
                warn!("Primary feed failed, skipping tick: {:#}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Primary feed timed out after {:?}, skipping tick",
                    self.fetch_timeout
                );
                return None;
            }
        };

        match secondary {
            Ok(extra) => spots.extend(extra),
            Err(e) => warn!("Secondary feed failed: {:#}", e),
        }
        Some(spots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::spot::SpotChange;
    use crate::module::stats::{ActivatorStats, StatsLookup};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use spotwatch_common::{ScheduleEntry, SpotSource};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeFeed {
        source: SpotSource,
        spots: Mutex<anyhow::Result<Vec<SpotRecord>>>,
    }

    impl FakeFeed {
        fn new(source: SpotSource, spots: Vec<SpotRecord>) -> Arc<Self> {
            Arc::new(Self {
                source,
                spots: Mutex::new(Ok(spots)),
            })
        }

        fn set(&self, spots: anyhow::Result<Vec<SpotRecord>>) {
            *self.spots.lock().unwrap() = spots;
        }
    }

    #[async_trait]
    impl SpotFeed for FakeFeed {
        fn source(&self) -> SpotSource {
            self.source
        }

        async fn fetch(&self, _tracked: &[String]) -> anyhow::Result<Vec<SpotRecord>> {
            match &*self.spots.lock().unwrap() {
                Ok(spots) => Ok(spots.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, SpotChange)>>,
        fail_for: Option<String>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(String, SpotChange)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send_spot(
            &self,
            spot: &SpotRecord,
            change: SpotChange,
            _stats: &ActivatorStats,
        ) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(spot.identifier.as_str()) {
                anyhow::bail!("webhook down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((spot.identifier.clone(), change));
            Ok(())
        }

        async fn send_scheduled(&self, _entry: &ScheduleEntry) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct NoStats;

    #[async_trait]
    impl StatsLookup for NoStats {
        async fn fetch_stats(&self, _base: &str) -> anyhow::Result<ActivatorStats> {
            anyhow::bail!("offline")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap()
    }

    fn spot(identifier: &str, mhz: f64, mode: &str, comment: &str, source: SpotSource) -> SpotRecord {
        SpotRecord {
            identifier: identifier.to_string(),
            frequency_mhz: Some(mhz),
            raw_frequency: format!("{}", mhz * 1000.0),
            mode: mode.to_string(),
            timestamp: now() - ChronoDuration::minutes(2),
            location: "US-FL".to_string(),
            reference: "US-11254".to_string(),
            display_name: "Park".to_string(),
            comment: comment.to_string(),
            source,
        }
    }

    struct Harness {
        _dir: TempDir,
        primary: Arc<FakeFeed>,
        secondary: Arc<FakeFeed>,
        sink: Arc<RecordingSink>,
        poller: SpotPoller,
    }

    async fn harness(tracked: &[&str], sink: RecordingSink) -> Harness {
        let dir = TempDir::new().unwrap();
        let callsigns = Arc::new(CallsignStore::new(dir.path().join("callsigns.txt")));
        for call in tracked {
            callsigns.add(call).await.unwrap();
        }

        let primary = FakeFeed::new(SpotSource::Primary, Vec::new());
        let secondary = FakeFeed::new(SpotSource::Secondary, Vec::new());
        let sink = Arc::new(sink);
        let stats = Arc::new(StatsCache::new(Arc::new(NoStats), ChronoDuration::hours(6)));

        let poller = SpotPoller::new(
            primary.clone(),
            Some(secondary.clone()),
            callsigns,
            stats,
            sink.clone(),
            Duration::from_secs(5),
        );

        Harness {
            _dir: dir,
            primary,
            secondary,
            sink,
            poller,
        }
    }

    #[tokio::test]
    async fn test_only_tracked_callsigns_notify() {
        let mut h = harness(&["N7OOS"], RecordingSink::default()).await;
        h.primary.set(Ok(vec![
            spot("W4/N7OOS/P", 14.285, "SSB", "", SpotSource::Primary),
            spot("K1ABC", 7.200, "SSB", "", SpotSource::Primary),
        ]));

        let report = h.poller.poll_once(now()).await;

        assert_eq!(report.fetched, 2);
        assert_eq!(report.matched, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(h.sink.sent(), vec![("W4/N7OOS/P".to_string(), SpotChange::New)]);
    }

    #[tokio::test]
    async fn test_repolled_spots_notify_once_then_qrt_once() {
        let mut h = harness(&["N7OOS"], RecordingSink::default()).await;
        let active = spot("N7OOS", 14.285, "SSB", "", SpotSource::Primary);
        let ended = spot("N7OOS", 14.285, "SSB", "QRT", SpotSource::Primary);

        h.primary.set(Ok(vec![active.clone()]));
        h.poller.poll_once(now()).await;
        h.poller.poll_once(now() + ChronoDuration::minutes(1)).await;

        h.primary.set(Ok(vec![ended]));
        h.poller.poll_once(now() + ChronoDuration::minutes(2)).await;
        h.poller.poll_once(now() + ChronoDuration::minutes(3)).await;

        assert_eq!(
            h.sink.sent(),
            vec![
                ("N7OOS".to_string(), SpotChange::New),
                ("N7OOS".to_string(), SpotChange::Ended),
            ]
        );
    }

    #[tokio::test]
    async fn test_primary_failure_skips_tick() {
        let mut h = harness(&["N7OOS"], RecordingSink::default()).await;
        h.primary.set(Err(anyhow::anyhow!("503")));
        h.secondary.set(Ok(vec![spot("N7OOS", 14.025, "CW", "", SpotSource::Secondary)]));

        let report = h.poller.poll_once(now()).await;

        assert!(report.skipped);
        assert!(h.sink.sent().is_empty());
        assert!(h.poller.tracker().is_empty());
    }

    struct SlowFeed;

    #[async_trait]
    impl SpotFeed for SlowFeed {
        fn source(&self) -> SpotSource {
            SpotSource::Primary
        }

        async fn fetch(&self, _tracked: &[String]) -> anyhow::Result<Vec<SpotRecord>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![spot("N7OOS", 14.285, "SSB", "", SpotSource::Primary)])
        }
    }

    #[tokio::test]
    async fn test_primary_timeout_skips_tick() {
        let dir = TempDir::new().unwrap();
        let callsigns = Arc::new(CallsignStore::new(dir.path().join("callsigns.txt")));
        callsigns.add("N7OOS").await.unwrap();
        let sink = Arc::new(RecordingSink::default());
        let stats = Arc::new(StatsCache::new(Arc::new(NoStats), ChronoDuration::hours(6)));

        let mut poller = SpotPoller::new(
            Arc::new(SlowFeed),
            None,
            callsigns,
            stats,
            sink.clone(),
            Duration::from_millis(50),
        );

        let report = poller.poll_once(now()).await;
        assert!(report.skipped);
        assert!(sink.sent().is_empty());
        assert!(poller.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_spots_are_merged() {
        let mut h = harness(&["N7OOS", "K1ABC"], RecordingSink::default()).await;
        h.primary.set(Ok(vec![spot("N7OOS", 14.285, "SSB", "", SpotSource::Primary)]));
        h.secondary.set(Ok(vec![spot("K1ABC", 14.025, "CW", "", SpotSource::Secondary)]));

        let report = h.poller.poll_once(now()).await;
        assert_eq!(report.notified, 2);

        // A failing secondary feed leaves the primary results alone.
        h.secondary.set(Err(anyhow::anyhow!("rbn down")));
        h.primary.set(Ok(vec![spot("N7OOS", 14.285, "CW", "", SpotSource::Primary)]));
        let report = h.poller.poll_once(now()).await;
        assert!(!report.skipped);
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_tick() {
        let sink = RecordingSink {
            fail_for: Some("N7OOS".to_string()),
            ..Default::default()
        };
        let mut h = harness(&["N7OOS", "K1ABC"], sink).await;
        h.primary.set(Ok(vec![
            spot("N7OOS", 14.285, "SSB", "", SpotSource::Primary),
            spot("K1ABC", 7.200, "SSB", "", SpotSource::Primary),
        ]));

        let report = h.poller.poll_once(now()).await;
        assert_eq!(report.notified, 1);
        assert_eq!(h.sink.sent(), vec![("K1ABC".to_string(), SpotChange::New)]);
    }

    #[tokio::test]
    async fn test_idle_activators_expire() {
        let mut h = harness(&["N7OOS"], RecordingSink::default()).await;
        h.primary.set(Ok(vec![spot("N7OOS", 14.285, "SSB", "", SpotSource::Primary)]));
        h.poller.poll_once(now()).await;
        assert_eq!(h.poller.tracker().len(), 1);

        h.primary.set(Ok(Vec::new()));
        let report = h.poller.poll_once(now() + ChronoDuration::minutes(31)).await;
        assert_eq!(report.expired, 1);
        assert!(h.poller.tracker().is_empty());
    }
}
