use chrono::{DateTime, Duration, Utc};
use spotwatch_common::base_callsign;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{ActivatorStats, StatsLookup};

#[derive(Debug, Clone)]
struct CachedStats {
    stats: ActivatorStats,
    fetched_at: DateTime<Utc>,
}

/// TTL cache over [`StatsLookup`], keyed by upper-cased base callsign.
///
/// Concurrent misses for the same key share one lookup: the first caller
/// fetches while the rest wait on a per-key lock and then read the cache.
/// Failures are never cached and never surface to the caller.
pub struct StatsCache {
    lookup: Arc<dyn StatsLookup>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedStats>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StatsCache {
    pub fn new(lookup: Arc<dyn StatsLookup>, ttl: Duration) -> Self {
        Self {
            lookup,
            ttl,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, identifier: &str) -> ActivatorStats {
        self.lookup_at(identifier, Utc::now()).await
    }

    pub async fn lookup_at(&self, identifier: &str, now: DateTime<Utc>) -> ActivatorStats {
        let key = base_callsign(identifier.trim()).to_uppercase();

        if let Some(stats) = self.fresh(&key, now).await {
            return stats;
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.entry(key.clone()).or_default().clone()
        };
        let _guard = key_lock.lock().await;

        // Someone else may have filled it while we waited.
        if let Some(stats) = self.fresh(&key, now).await {
            return stats;
        }

        let result = self.lookup.fetch_stats(&key).await;
        let stats = match result {
            Ok(stats) => {
                debug!("Fetched activator stats for {}", key);
                let mut entries = self.entries.write().await;
                let before = entries.len();
                entries.retain(|_, cached| now - cached.fetched_at <= self.ttl);
                if entries.len() < before {
                    debug!("Evicted {} expired stats entries", before - entries.len());
                }
                entries.insert(
                    key.clone(),
                    CachedStats {
                        stats: stats.clone(),
                        fetched_at: now,
                    },
                );
                stats
            }
            Err(e) => {
                warn!("Activator stats lookup failed for {}: {:#}", key, e);
                ActivatorStats::unknown()
            }
        };

        self.in_flight.lock().await.remove(&key);
        stats
    }

    async fn fresh(&self, key: &str, now: DateTime<Utc>) -> Option<ActivatorStats> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|cached| now - cached.fetched_at <= self.ttl)
            .map(|cached| cached.stats.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
