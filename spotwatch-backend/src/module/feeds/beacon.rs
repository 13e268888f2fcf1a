use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use spotwatch_common::{SpotRecord, SpotSource};
use std::time::Duration;
use tracing::{debug, warn};

use super::{build_client, khz_to_mhz, parse_utc_timestamp, SpotFeed};

/// Comment attached to every skimmer spot so it can be told apart downstream.
pub const BEACON_COMMENT: &str = "[skimmer spot]";

/// One row of the skimmer feed, newest first.
#[derive(Debug, Deserialize)]
struct RawBeaconRow {
    #[serde(default)]
    dx: Option<String>,
    #[serde(default)]
    spotter: Option<String>,
    #[serde(default)]
    freq: serde_json::Value,
    #[serde(default)]
    snr: Option<i64>,
    #[serde(default)]
    wpm: Option<u32>,
    #[serde(default)]
    time: Option<String>,
}

/// Parse one per-callsign response. Only the first row is used.
pub fn parse_beacon_rows(queried: &str, json: &str) -> Result<Option<SpotRecord>> {
    let rows: Vec<RawBeaconRow> =
        serde_json::from_str(json).context("Failed to deserialize skimmer JSON")?;

    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };

    let time = row.time.unwrap_or_default();
    let timestamp = parse_utc_timestamp(&time)
        .with_context(|| format!("Bad skimmer time '{}' for {}", time, queried))?;

    let identifier = row
        .dx
        .map(|dx| dx.trim().to_uppercase())
        .filter(|dx| !dx.is_empty())
        .unwrap_or_else(|| queried.to_uppercase());

    let (frequency_mhz, raw_frequency) = khz_to_mhz(&row.freq);
    let snr = row.snr.map_or_else(|| "?".to_string(), |v| v.to_string());
    let wpm = row.wpm.map_or_else(|| "?".to_string(), |v| v.to_string());

    Ok(Some(SpotRecord {
        identifier,
        frequency_mhz,
        raw_frequency,
        mode: "CW".to_string(),
        timestamp,
        location: format!("de {}", row.spotter.unwrap_or_else(|| "?".to_string())),
        reference: format!("{} dB", snr),
        display_name: format!("{} WPM", wpm),
        comment: BEACON_COMMENT.to_string(),
        source: SpotSource::Secondary,
    }))
}

/// Secondary feed: one paced request per tracked callsign.
pub struct BeaconFeed {
    client: reqwest::Client,
    url_template: String,
    pacing: Duration,
}

impl BeaconFeed {
    /// `url_template` must contain `{call}`.
    pub fn new(url_template: impl Into<String>, timeout: Duration, pacing: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url_template: url_template.into(),
            pacing,
        })
    }

    fn url_for(&self, callsign: &str) -> String {
        self.url_template
            .replace("{call}", &urlencoding::encode(callsign))
    }

    async fn fetch_one(&self, callsign: &str) -> Result<Option<SpotRecord>> {
        let response = self
            .client
            .get(self.url_for(callsign))
            .send()
            .await
            .with_context(|| format!("Failed to GET skimmer spots for {}", callsign))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} for {}", response.status(), callsign);
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read skimmer response for {}", callsign))?;
        parse_beacon_rows(callsign, &body)
    }
}

#[async_trait]
impl SpotFeed for BeaconFeed {
    fn source(&self) -> SpotSource {
        SpotSource::Secondary
    }

    /// Failures for one callsign are logged and skipped; the rest still count.
    async fn fetch(&self, tracked: &[String]) -> Result<Vec<SpotRecord>> {
        let mut spots = Vec::new();

        for (index, callsign) in tracked.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            match self.fetch_one(callsign).await {
                Ok(Some(spot)) => spots.push(spot),
                Ok(None) => debug!("No skimmer spots for {}", callsign),
                Err(e) => warn!("Skimmer fetch failed for {}: {:#}", callsign, e),
            }
        }

        debug!("Skimmer feed returned {} spots for {} callsigns", spots.len(), tracked.len());
        Ok(spots)
    }
}
