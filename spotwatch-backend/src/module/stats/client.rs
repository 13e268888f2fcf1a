use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{ActivatorStats, StatsLookup};
use crate::module::feeds::build_client;

#[derive(Debug, Deserialize)]
struct RawCounts {
    #[serde(default)]
    activations: Option<u64>,
    #[serde(default)]
    qsos: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUserStats {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    gravatar: Option<String>,
    #[serde(default)]
    activator: Option<RawCounts>,
}

pub fn parse_activator_stats(json: &str) -> Result<ActivatorStats> {
    let raw: RawUserStats =
        serde_json::from_str(json).context("Failed to deserialize activator stats")?;
    let counts = raw.activator.unwrap_or(RawCounts {
        activations: None,
        qsos: None,
    });

    Ok(ActivatorStats {
        name: raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| ActivatorStats::unknown().name),
        activations: counts.activations,
        qsos: counts.qsos,
        gravatar: raw.gravatar.filter(|g| !g.is_empty()),
    })
}

/// Looks up `/stats/user/{call}` style endpoints.
pub struct PotaStatsClient {
    client: reqwest::Client,
    url_template: String,
}

impl PotaStatsClient {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url_template: url_template.into(),
        })
    }
}

#[async_trait]
impl StatsLookup for PotaStatsClient {
    async fn fetch_stats(&self, base_callsign: &str) -> Result<ActivatorStats> {
        let url = self
            .url_template
            .replace("{call}", &urlencoding::encode(base_callsign));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to GET stats for {}", base_callsign))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} for stats of {}", response.status(), base_callsign);
        }

        let body = response.text().await.context("Failed to read stats body")?;
        parse_activator_stats(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_activator_stats() {
        let json = r#"{
            "callsign": "N7OOS",
            "name": "Jim Vaughn",
            "qth": "FL",
            "gravatar": "f956ca7887ccc87645abc313a4a3a373",
            "activator": {"activations": 120, "parks": 80, "qsos": 4321},
            "hunter": {"parks": 10, "qsos": 50}
        }"#;
        let stats = parse_activator_stats(json).unwrap();
        assert_eq!(stats.name, "Jim Vaughn");
        assert_eq!(stats.activations, Some(120));
        assert_eq!(stats.qsos, Some(4321));
        assert_eq!(stats.gravatar.as_deref(), Some("f956ca7887ccc87645abc313a4a3a373"));
    }

    #[test]
    fn test_parse_sparse_stats() {
        let stats = parse_activator_stats(r#"{"name": ""}"#).unwrap();
        assert_eq!(stats.name, "Unknown");
        assert_eq!(stats.activations, None);
        assert_eq!(stats.gravatar, None);
    }

    #[tokio::test]
    async fn test_fetch_stats_from_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/stats/user/N7OOS")
            .with_status(200)
            .with_body(r#"{"name": "Jim", "gravatar": "abc", "activator": {"activations": 3, "qsos": 90}}"#)
            .create_async()
            .await;

        let client = PotaStatsClient::new(
            format!("{}/stats/user/{{call}}", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let stats = client.fetch_stats("N7OOS").await.unwrap();

        mock.assert_async().await;
        assert_eq!(stats.name, "Jim");
        assert_eq!(stats.qsos, Some(90));
    }
}
