///! Spot feed adapters
///!
///! Both feeds are normalized into [`SpotRecord`]:
///! - `pota`: the primary activator feed, one request per poll
///! - `beacon`: the secondary skimmer feed, one request per tracked callsign

mod beacon;
mod pota;

pub use beacon::{BeaconFeed, parse_beacon_rows, BEACON_COMMENT};
pub use pota::{PotaFeed, parse_pota_spots};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use spotwatch_common::{SpotRecord, SpotSource};
use std::time::Duration;

/// A source of normalized spots.
#[async_trait]
pub trait SpotFeed: Send + Sync {
    fn source(&self) -> SpotSource;

    /// Fetch the current snapshot. `tracked` is the callsign list for this tick;
    /// feeds that return everything may ignore it.
    async fn fetch(&self, tracked: &[String]) -> Result<Vec<SpotRecord>>;
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("spotwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Parse a feed timestamp as UTC. Timestamps without an offset are taken as UTC.
pub(crate) fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Feeds report kHz, as a string or a number. Returns (MHz, raw text).
pub(crate) fn khz_to_mhz(value: &serde_json::Value) -> (Option<f64>, String) {
    let raw = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    let mhz = raw
        .parse::<f64>()
        .ok()
        .filter(|khz| khz.is_finite())
        .map(|khz| khz / 1000.0);
    (mhz, raw)
}
