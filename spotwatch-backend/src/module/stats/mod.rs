///! Activator statistics
///!
///! Presentation-only enrichment for spot notifications: activation and QSO
///! counts, display name, avatar. Looked up per base callsign and cached.

mod cache;
mod client;

pub use cache::StatsCache;
pub use client::{PotaStatsClient, parse_activator_stats};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatorStats {
    pub name: String,
    /// `None` when unknown
    pub activations: Option<u64>,
    pub qsos: Option<u64>,
    /// Gravatar hash, if the activator has one
    pub gravatar: Option<String>,
}

impl ActivatorStats {
    /// Placeholder served when the lookup fails.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            activations: None,
            qsos: None,
            gravatar: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// Network lookup behind the cache.
#[async_trait]
pub trait StatsLookup: Send + Sync {
    async fn fetch_stats(&self, base_callsign: &str) -> Result<ActivatorStats>;
}
