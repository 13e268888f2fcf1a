use spotwatch_common::{MessageContent, ScheduleEntry};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::parse_time_utc;
use crate::error::{BotError, Result};
use crate::utils::write_atomic;

/// The schedule file.
///
/// Reads wait for in-flight writes instead of skipping. Mutations are
/// read-modify-write under the same lock and replace the file atomically.
pub struct ScheduleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScheduleStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in file order.
    pub async fn load(&self) -> Result<Vec<ScheduleEntry>> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Change the send time and, optionally, the weekday.
    /// Returns `Ok(false)` when no entry has that name.
    pub async fn set_time(&self, name: &str, time: &str, dow: Option<i64>) -> Result<bool> {
        parse_time_utc(time)?;
        let dow = match dow {
            Some(d) if (0..=6).contains(&d) => Some(d as u8),
            Some(d) => return Err(BotError::InvalidDayOfWeek(d)),
            None => None,
        };

        self.update(name, |entry| {
            entry.time_utc = time.to_string();
            if let Some(dow) = dow {
                entry.dow = dow;
            }
        })
        .await
    }

    /// Replace the message body with `text`, and the rich payload when
    /// `rich_json` is given (a JSON array of card objects).
    pub async fn set_content(&self, name: &str, text: &str, rich_json: Option<&str>) -> Result<bool> {
        let rich = match rich_json.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                serde_json::from_str::<Vec<serde_json::Value>>(raw)
                    .map_err(|e| BotError::InvalidRichContent(e.to_string()))?,
            ),
            None => None,
        };

        self.update(name, |entry| {
            entry.content = MessageContent::Lines(vec![text.to_string()]);
            if let Some(rich) = rich {
                entry.rich_content = rich;
            }
        })
        .await
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        self.update(name, |entry| entry.enabled = enabled).await
    }

    /// Overwrite the whole schedule.
    pub async fn replace_all(&self, entries: &[ScheduleEntry]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(entries).await
    }

    async fn update<F>(&self, name: &str, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut ScheduleEntry),
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_unlocked().await?;

        let Some(entry) = entries.iter_mut().find(|e| e.name == name) else {
            debug!("No scheduled message named '{}'", name);
            return Ok(false);
        };
        apply(entry);

        self.write_unlocked(&entries).await?;
        info!("Updated scheduled message '{}'", name);
        Ok(true)
    }

    async fn read_unlocked(&self) -> Result<Vec<ScheduleEntry>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_unlocked(&self, entries: &[ScheduleEntry]) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.path, content.as_bytes()).await?;
        Ok(())
    }
}
