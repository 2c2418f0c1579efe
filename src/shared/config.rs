//! Application configuration. Bot credentials, admins, paths, scheduling knobs.

use chrono::{FixedOffset, Local, Offset};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TICK_SECS: u64 = 20;
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Bot API token. Read from TG_BROADCAST_BOT_TOKEN or BOT_TOKEN.
    pub bot_token: Option<String>,

    /// Comma-separated Telegram user ids allowed to administer the bot.
    /// Read from TG_BROADCAST_ADMIN_IDS or ADMIN_IDS.
    #[serde(default)]
    pub admin_ids: Option<String>,

    pub data_dir: Option<String>,

    /// Store document path. Defaults to `<data_dir>/bot_config.json`.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Scheduler tick in seconds. Must divide 60.
    #[serde(default)]
    pub tick_secs: Option<u64>,

    /// Offset of the scheduling zone from UTC. Defaults to the host offset at startup.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    #[serde(default)]
    pub dispatch_concurrency: Option<usize>,

    #[serde(default)]
    pub delivery_timeout_secs: Option<u64>,

    /// Idle authoring drafts are dropped after this many seconds.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,

    /// Long-poll wait passed to getUpdates.
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,

    #[serde(default)]
    pub api_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("TG_BROADCAST"));
        if let Ok(path) = std::env::var("TG_BROADCAST_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // BOT_TOKEN and ADMIN_IDS are also accepted without prefix so a plain .env works
        if cfg.bot_token.is_none() {
            cfg.bot_token = std::env::var("BOT_TOKEN").ok().filter(|s| !s.trim().is_empty());
        }
        if cfg.admin_ids.is_none() {
            cfg.admin_ids = std::env::var("ADMIN_IDS").ok();
        }
        Ok(cfg)
    }

    /// Returns the parsed admin ids. Blank and malformed entries are skipped.
    pub fn admin_ids(&self) -> Vec<i64> {
        self.admin_ids
            .as_deref()
            .map(parse_admin_ids)
            .unwrap_or_default()
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    pub fn state_file_or_default(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => PathBuf::from(path),
            None => self.data_dir_or_default().join("bot_config.json"),
        }
    }

    /// Returns the scheduler tick. Values that are 0, above 60 or do not divide 60 fall back to 20s.
    pub fn tick_or_default(&self) -> Duration {
        let secs = match self.tick_secs {
            Some(s) if s > 0 && s <= 60 && 60 % s == 0 => s,
            Some(s) => {
                warn!(tick_secs = s, "tick must divide 60; using default");
                DEFAULT_TICK_SECS
            }
            None => DEFAULT_TICK_SECS,
        };
        Duration::from_secs(secs)
    }

    /// Returns the scheduling zone. Falls back to the host offset if unset or out of range.
    pub fn zone_or_default(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|m| m.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn dispatch_concurrency_or_default(&self) -> usize {
        self.dispatch_concurrency.unwrap_or(4).max(1)
    }

    pub fn delivery_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs.unwrap_or(30))
    }

    pub fn session_ttl_or_default(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.unwrap_or(1800))
    }

    pub fn poll_timeout_secs_or_default(&self) -> u64 {
        self.poll_timeout_secs.unwrap_or(30)
    }

    pub fn api_url_or_default(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }
}

/// Parse `"123, 456,,abc"` into `[123, 456]`.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(entry = s, "ignoring malformed admin id");
                None
            }
        })
        .collect()
}
