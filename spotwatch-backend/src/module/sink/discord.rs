use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use spotwatch_common::{ScheduleEntry, SpotRecord};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::card::{spot_content, spot_embed};
use super::NotificationSink;
use crate::config::SinkConfig;
use crate::module::spot::SpotChange;
use crate::module::stats::ActivatorStats;

#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: String,
    username: &'a str,
    embeds: Vec<serde_json::Value>,
    allowed_mentions: AllowedMentions,
}

/// Posts notifications to Discord incoming webhooks.
pub struct DiscordWebhookSink {
    client: reqwest::Client,
    default_url: String,
    channels: HashMap<String, String>,
    ping_role_id: Option<u64>,
    username: String,
}

impl DiscordWebhookSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build webhook client")?;

        Ok(Self {
            client,
            default_url: config.webhook_url.clone(),
            channels: config.channels.clone(),
            ping_role_id: config.ping_role_id,
            username: config.username.clone(),
        })
    }

    fn url_for(&self, destination: Option<&str>) -> Result<&str> {
        match destination {
            None => Ok(&self.default_url),
            Some(name) => self
                .channels
                .get(name)
                .map(String::as_str)
                .with_context(|| format!("Unknown destination '{}'", name)),
        }
    }

    async fn post(&self, url: &str, message: &WebhookMessage<'_>) -> Result<()> {
        let dispatch_id = Uuid::now_v7();
        tracing::debug!("Posting webhook message {}: {:?}", dispatch_id, message.content);

        self.client
            .post(url)
            .json(message)
            .send()
            .await
            .with_context(|| format!("Failed to POST webhook message {}", dispatch_id))?
            .error_for_status()
            .with_context(|| format!("Webhook rejected message {}", dispatch_id))?;

        tracing::info!("Webhook message {} delivered", dispatch_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    async fn send_spot(
        &self,
        spot: &SpotRecord,
        change: SpotChange,
        stats: &ActivatorStats,
    ) -> Result<()> {
        let embed = spot_embed(spot, change, stats);
        let message = WebhookMessage {
            content: spot_content(self.ping_role_id),
            username: &self.username,
            embeds: vec![serde_json::to_value(&embed)?],
            allowed_mentions: AllowedMentions {
                parse: vec!["roles", "users"],
            },
        };
        self.post(&self.default_url, &message).await
    }

    async fn send_scheduled(&self, entry: &ScheduleEntry) -> Result<()> {
        let url = self.url_for(entry.destination.as_deref())?;
        let message = WebhookMessage {
            content: entry.content.joined(),
            username: &self.username,
            embeds: entry.rich_content.clone(),
            allowed_mentions: AllowedMentions {
                parse: vec!["roles", "users"],
            },
        };
        self.post(url, &message).await
    }
}
