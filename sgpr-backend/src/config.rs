use anyhow::Context;
use chrono::{FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sgpr_common::Category;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::module::delivery::REGISTRY_FILE;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Longest accepted backlog for new destinations (100 years)
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 365 * 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Telegram user ids allowed to run admin commands
    #[serde(default)]
    pub admins: Vec<i64>,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    #[serde(default = "default_first_delay_seconds")]
    pub first_delay_seconds: u64,

    /// Newest records kept per category and cycle
    #[serde(default = "default_fetch_cap")]
    pub fetch_cap: usize,

    /// Backlog sent to a destination that has no watermark yet
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,

    /// UTC offset of the timestamps shown on the listing pages
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_signature")]
    pub signature: String,

    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Category name → listing page URL
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_interval_seconds() -> u64 {
    3600
}

fn default_first_delay_seconds() -> u64 {
    60
}

fn default_fetch_cap() -> usize {
    crate::module::listing::DEFAULT_FETCH_CAP
}

fn default_lookback_hours() -> i64 {
    crate::module::delivery::DEFAULT_LOOKBACK_HOURS
}

fn default_utc_offset_hours() -> i32 {
    8
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_signature() -> String {
    crate::module::listing::DEFAULT_SIGNATURE.to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

fn default_sources() -> BTreeMap<String, String> {
    Category::ALL
        .iter()
        .map(|c| (c.to_string(), c.default_url().to_string()))
        .collect()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            poll_timeout_seconds: default_poll_timeout_seconds(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
            admins: Vec::new(),
            interval_seconds: default_interval_seconds(),
            first_delay_seconds: default_first_delay_seconds(),
            fetch_cap: default_fetch_cap(),
            lookback_hours: default_lookback_hours(),
            utc_offset_hours: default_utc_offset_hours(),
            request_timeout_seconds: default_request_timeout_seconds(),
            signature: default_signature(),
            telegram: TelegramConfig::default(),
            sources: default_sources(),
        }
    }
}

impl BotConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: BotConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// `TOKEN` and `ADMINS` (comma separated) take precedence over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TOKEN").filter(|t| !t.trim().is_empty()) {
            self.telegram.token = token.trim().to_string();
        }
        if let Some(admins) = lookup("ADMINS").filter(|a| !a.trim().is_empty()) {
            self.admins = admins
                .split(',')
                .map(|id| id.trim().parse::<i64>())
                .collect::<Result<_, _>>()
                .with_context(|| format!("Invalid ADMINS value: {}", admins))?;
        }
        Ok(())
    }

    /// Configured sources keyed by category. Unknown category names are
    /// skipped with a warning.
    pub fn sources(&self) -> BTreeMap<Category, String> {
        let mut sources = BTreeMap::new();
        for (name, url) in &self.sources {
            match name.parse::<Category>() {
                Ok(category) => {
                    sources.insert(category, url.clone());
                }
                Err(e) => tracing::warn!("Ignoring source {}: {}", url, e),
            }
        }
        sources
    }

    pub fn registry_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(REGISTRY_FILE)
    }

    pub fn utc_offset(&self) -> anyhow::Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("Invalid utc_offset_hours: {}", self.utc_offset_hours))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.telegram.token.is_empty(), "telegram.token is not set");
        anyhow::ensure!(self.interval_seconds > 0, "interval_seconds must be positive");
        anyhow::ensure!(self.fetch_cap > 0, "fetch_cap must be positive");
        anyhow::ensure!(
            (0..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours),
            "lookback_hours must be between 0 and {}",
            MAX_LOOKBACK_HOURS
        );
        self.utc_offset()?;
        if self.admins.is_empty() {
            tracing::warn!("No admins configured, admin commands are disabled");
        }
        Ok(())
    }
}

/// Wall-clock time at `offset`, comparable with listing timestamps
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

pub static CONFIG: OnceLock<BotConfig> = OnceLock::new();

pub fn read_config<P: AsRef<Path>>(path: P) -> anyhow::Result<&'static BotConfig> {
    let mut config = BotConfig::from_file(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;

    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Configuration already loaded"))?;
    CONFIG.get().context("Configuration missing after load")
}
