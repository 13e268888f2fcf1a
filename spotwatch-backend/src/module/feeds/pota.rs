use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use spotwatch_common::{SpotRecord, SpotSource};
use std::time::Duration;
use tracing::{debug, warn};

use super::{build_client, khz_to_mhz, parse_utc_timestamp, SpotFeed};

/// Raw spot as returned by the POTA activator endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPotaSpot {
    #[serde(default)]
    activator: Option<String>,
    #[serde(default)]
    frequency: serde_json::Value,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location_desc: Option<String>,
    #[serde(default)]
    spot_time: Option<String>,
    #[serde(default)]
    comments: Option<String>,
}

/// Parse the POTA activator JSON into normalized spots.
///
/// Spots without an activator or with an unreadable time are dropped with a warning.
pub fn parse_pota_spots(json: &str) -> Result<Vec<SpotRecord>> {
    let raw: Vec<RawPotaSpot> =
        serde_json::from_str(json).context("Failed to deserialize POTA spot JSON")?;

    let spots = raw
        .into_iter()
        .filter_map(|raw| {
            let identifier = raw.activator.map(|a| a.trim().to_uppercase()).unwrap_or_default();
            if identifier.is_empty() {
                warn!("Skipping POTA spot without activator");
                return None;
            }

            let spot_time = raw.spot_time.unwrap_or_default();
            let Some(timestamp) = parse_utc_timestamp(&spot_time) else {
                warn!("Skipping POTA spot for {}: bad spotTime '{}'", identifier, spot_time);
                return None;
            };

            let (frequency_mhz, raw_frequency) = khz_to_mhz(&raw.frequency);
            if frequency_mhz.is_none() {
                warn!("Non-numeric frequency '{}' for {}", raw_frequency, identifier);
            }

            Some(SpotRecord {
                identifier,
                frequency_mhz,
                raw_frequency,
                mode: raw.mode.unwrap_or_default().trim().to_uppercase(),
                timestamp,
                location: raw.location_desc.unwrap_or_default(),
                reference: raw.reference.unwrap_or_default(),
                display_name: raw.name.unwrap_or_default(),
                comment: raw.comments.unwrap_or_default(),
                source: SpotSource::Primary,
            })
        })
        .collect();

    Ok(spots)
}

/// Primary feed: every current activator spot in one request.
pub struct PotaFeed {
    client: reqwest::Client,
    url: String,
}

impl PotaFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SpotFeed for PotaFeed {
    fn source(&self) -> SpotSource {
        SpotSource::Primary
    }

    async fn fetch(&self, _tracked: &[String]) -> Result<Vec<SpotRecord>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to GET POTA spots")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} from POTA spot feed", response.status());
        }

        let body = response
            .text()
            .await
            .context("Failed to read POTA response body")?;
        let spots = parse_pota_spots(&body)?;

        debug!("POTA feed returned {} spots", spots.len());
        Ok(spots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"spotId": 1, "activator": "N7OOS", "frequency": "14285", "mode": "SSB",
         "reference": "US-11254", "name": "Test State Park", "locationDesc": "US-FL",
         "spotTime": "2026-10-17T14:50:00", "spotter": "K1ABC", "comments": "cq cq"},
        {"spotId": 2, "activator": "w4/k1abc/p", "frequency": 7032.5, "mode": "cw",
         "reference": "US-0001", "name": "Other Park", "locationDesc": "US-GA",
         "spotTime": "2026-10-17T14:51:00", "comments": null},
        {"spotId": 3, "activator": "K2XYZ", "frequency": "14074", "mode": "FT8",
         "spotTime": "not a time"}
    ]"#;

    #[test]
    fn test_parse_pota_spots() {
        let spots = parse_pota_spots(SAMPLE).unwrap();
        assert_eq!(spots.len(), 2);

        let s = &spots[0];
        assert_eq!(s.identifier, "N7OOS");
        assert_eq!(s.frequency_mhz, Some(14.285));
        assert_eq!(s.raw_frequency, "14285");
        assert_eq!(s.mode, "SSB");
        assert_eq!(s.reference, "US-11254");
        assert_eq!(s.display_name, "Test State Park");
        assert_eq!(s.location, "US-FL");
        assert_eq!(s.comment, "cq cq");
        assert_eq!(s.source, SpotSource::Primary);
        assert_eq!(s.timestamp.to_rfc3339(), "2026-10-17T14:50:00+00:00");

        let s = &spots[1];
        assert_eq!(s.identifier, "W4/K1ABC/P");
        assert_eq!(s.base_identifier(), "K1ABC");
        assert_eq!(s.frequency_mhz, Some(7.0325));
        assert_eq!(s.mode, "CW");
        assert_eq!(s.comment, "");
    }

    #[test]
    fn test_parse_pota_spots_rejects_non_array() {
        assert!(parse_pota_spots(r#"{"error": "down"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_from_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/spot/activator")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let feed = PotaFeed::new(
            format!("{}/spot/activator", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let spots = feed.fetch(&[]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(spots.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/spot/activator")
            .with_status(503)
            .create_async()
            .await;

        let feed = PotaFeed::new(
            format!("{}/spot/activator", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(feed.fetch(&[]).await.is_err());
    }
}
