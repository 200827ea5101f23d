//! Runtime configuration
//!
//! Values come from an optional TOML file (`price-tracker.toml`, or the
//! path in `PRICE_TRACKER_CONFIG`) with every section defaulted. A few
//! deployment settings are taken from the environment afterwards so they
//! can live in `.env`:
//!
//! - `DATABASE_URL`: SQLite connection string
//! - `DISCORD_WEBHOOK_URL`: enables Discord notifications when set

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::locator::MatchingConfig;

pub const DEFAULT_CONFIG_PATH: &str = "price-tracker.toml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/price-tracker.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_secs: u64,
    /// Pause between consecutive page fetches during a bulk refresh.
    pub delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            accept_language: "zh-TW,zh;q=0.8,en-US;q=0.5,en;q=0.3".to_string(),
            timeout_secs: 30,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub auto_refresh: bool,
    pub interval_hours: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            interval_hours: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per item; the oldest are dropped first. Must be at
    /// least 1.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub discord_webhook_url: Option<String>,
    pub fetch: FetchConfig,
    pub matching: MatchingConfig,
    pub refresh: RefreshConfig,
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            discord_webhook_url: None,
            fetch: FetchConfig::default(),
            matching: MatchingConfig::default(),
            refresh: RefreshConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("parse price-tracker.toml")?;
        ensure!(config.history.limit > 0, "history.limit must be at least 1");
        Ok(config)
    }

    /// File (when present) overlaid with environment variables.
    pub fn load() -> Result<Self> {
        let path = std::env::var("PRICE_TRACKER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL")
            && !url.trim().is_empty()
        {
            self.discord_webhook_url = Some(url);
        }
    }
}
