use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which feed a spot came from. Only affects presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpotSource {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "secondary")]
    Secondary,
}

impl SpotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotSource::Primary => "primary",
            SpotSource::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for SpotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SpotSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" | "pota" => Ok(SpotSource::Primary),
            "secondary" | "beacon" | "rbn" => Ok(SpotSource::Secondary),
            _ => Err(format!("Unknown spot source: {}", s)),
        }
    }
}

/// A normalized spot, produced fresh every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    /// Raw activator identifier as given by the feed, e.g. "W4/N7OOS/P"
    pub identifier: String,
    /// Frequency in MHz. `None` when the feed sent something non-numeric.
    pub frequency_mhz: Option<f64>,
    /// Frequency exactly as the feed reported it
    pub raw_frequency: String,
    pub mode: String,
    /// Feed-supplied spot time, normalized to UTC
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub reference: String,
    pub display_name: String,
    pub comment: String,
    pub source: SpotSource,
}

impl SpotRecord {
    /// True when the comment carries the "activity ended" marker.
    pub fn is_qrt(&self) -> bool {
        self.comment.to_lowercase().contains("qrt")
    }

    /// Digital FT modes (FT8, FT4) jitter frequency without a real retune.
    pub fn is_ft_mode(&self) -> bool {
        self.mode.starts_with("FT")
    }

    pub fn base_identifier(&self) -> &str {
        base_callsign(&self.identifier)
    }
}

/// Return the base component of a decorated callsign: the longer of the first
/// two slash-separated parts ("W4/N7OOS/P" -> "N7OOS"). Ties keep the first part.
pub fn base_callsign(callsign: &str) -> &str {
    let mut parts = callsign.split('/');
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        Some(second) if second.len() > first.len() => second,
        _ => first,
    }
}

/// Message body of a scheduled entry: a single string or a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Lines(Vec<String>),
}

impl MessageContent {
    /// Lines are joined with newlines.
    pub fn joined(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Lines(lines) => lines.join("\n"),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// One operator-configured message, persisted in the schedule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique key within the schedule
    pub name: String,
    /// Day of week, Monday = 0 .. Sunday = 6
    pub dow: u8,
    /// "HH:MM" in UTC
    pub time_utc: String,
    #[serde(default = "default_enabled", deserialize_with = "deserialize_enabled")]
    pub enabled: bool,
    #[serde(rename = "msg", default)]
    pub content: MessageContent,
    /// Structured card payloads, passed through to the sink untouched
    #[serde(rename = "embeds", default)]
    pub rich_content: Vec<serde_json::Value>,
    /// Named destination; `None` means the default channel
    #[serde(default, alias = "channel", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Older schedule files store `enabled` as 0/1.
fn deserialize_enabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "enabled must be 0 or 1, got {}",
            other
        ))),
    }
}
