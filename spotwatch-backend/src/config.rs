use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,

    /// Per-callsign URL template containing `{call}`. Empty disables the feed.
    #[serde(default)]
    pub secondary_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay between consecutive per-callsign secondary requests
    #[serde(default = "default_secondary_pacing_ms")]
    pub secondary_pacing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_url")]
    pub url: String,

    #[serde(default = "default_stats_ttl_hours")]
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub spot_interval_secs: u64,

    #[serde(default = "default_true")]
    pub perform_initial_poll: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Default Discord webhook. Empty means log-only.
    #[serde(default)]
    pub webhook_url: String,

    #[serde(default)]
    pub ping_role_id: Option<u64>,

    #[serde(default = "default_username")]
    pub username: String,

    /// Destination name -> webhook URL, for scheduled messages
    #[serde(default)]
    pub channels: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default = "default_admin_host")]
    pub host: String,

    #[serde(default = "default_admin_port")]
    pub port: u16,

    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,

    #[serde(default = "default_callsign_file")]
    pub callsign_file: String,

    #[serde(default = "default_schedule_file")]
    pub schedule_file: String,

    #[serde(default)]
    pub feeds: FeedConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

fn default_primary_url() -> String {
    "https://api.pota.app/spot/activator".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_secondary_pacing_ms() -> u64 {
    250
}

fn default_stats_url() -> String {
    "https://api.pota.app/stats/user/{call}".to_string()
}

fn default_stats_ttl_hours() -> i64 {
    6
}

fn default_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_username() -> String {
    "MGRA Bot".to_string()
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    3110
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_retention_days() -> u64 {
    3
}

fn default_callsign_file() -> String {
    "callsigns.txt".to_string()
}

fn default_schedule_file() -> String {
    "schedule.json".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            secondary_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            secondary_pacing_ms: default_secondary_pacing_ms(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            url: default_stats_url(),
            ttl_hours: default_stats_ttl_hours(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            spot_interval_secs: default_interval_secs(),
            perform_initial_poll: true,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            ping_role_id: None,
            username: default_username(),
            channels: HashMap::new(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_admin_host(),
            port: default_admin_port(),
            token: String::new(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_retention_days: default_log_retention_days(),
            callsign_file: default_callsign_file(),
            schedule_file: default_schedule_file(),
            feeds: FeedConfig::default(),
            stats: StatsConfig::default(),
            poll: PollConfig::default(),
            sink: SinkConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path))?;
        let config: BotConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.admin.enable && self.admin.token.trim().is_empty() {
            anyhow::bail!("[admin] is enabled but no token is configured");
        }
        if !self.feeds.secondary_url.is_empty() && !self.feeds.secondary_url.contains("{call}") {
            anyhow::bail!("[feeds] secondary_url must contain a {{call}} placeholder");
        }
        if !self.stats.url.contains("{call}") {
            anyhow::bail!("[stats] url must contain a {{call}} placeholder");
        }
        Ok(())
    }

    pub fn admin_address(&self) -> String {
        format!("{}:{}", self.admin.host, self.admin.port)
    }
}

pub static CONFIG: OnceLock<BotConfig> = OnceLock::new();

/// Load `path` into the process-wide [`CONFIG`]. A second call keeps the first value.
pub fn read_config(path: &str) -> anyhow::Result<&'static BotConfig> {
    let config = BotConfig::from_file(path)?;
    Ok(CONFIG.get_or_init(|| config))
}
