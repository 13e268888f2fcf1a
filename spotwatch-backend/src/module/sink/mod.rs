///! Outbound notifications
///!
///! The core hands over a decision plus the raw record; sinks own rendering.

mod card;
mod discord;

pub use card::{Embed, EmbedField, Thumbnail, spot_embed, spot_content};
pub use discord::DiscordWebhookSink;

use anyhow::Result;
use async_trait::async_trait;
use spotwatch_common::{ScheduleEntry, SpotRecord};
use tracing::info;

use super::spot::SpotChange;
use super::stats::ActivatorStats;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_spot(
        &self,
        spot: &SpotRecord,
        change: SpotChange,
        stats: &ActivatorStats,
    ) -> Result<()>;

    async fn send_scheduled(&self, entry: &ScheduleEntry) -> Result<()>;
}

/// Logs instead of sending. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_spot(
        &self,
        spot: &SpotRecord,
        change: SpotChange,
        stats: &ActivatorStats,
    ) -> Result<()> {
        let embed = spot_embed(spot, change, stats);
        info!("[dry-run] spot ({}): {}", change, embed.title);
        Ok(())
    }

    async fn send_scheduled(&self, entry: &ScheduleEntry) -> Result<()> {
        info!(
            "[dry-run] scheduled '{}' -> {}: {:?}",
            entry.name,
            entry.destination.as_deref().unwrap_or("default"),
            entry.content.joined()
        );
        Ok(())
    }
}
