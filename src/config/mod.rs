//! Configuration management for the delivery engine
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::channel::BotConfig;
use crate::delivery::DeliveryConfig;
use crate::scheduler::TriggerConfig;
use crate::store::DiskConfig;
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Content store configuration
    pub store: StoreSettings,

    /// Messaging channel configuration
    pub channel: ChannelSettings,

    /// Delivery behavior configuration
    pub delivery: DeliverySettings,

    /// Scheduler trigger configuration
    pub scheduler: TriggerConfig,

    /// Durable state file locations
    pub state: StateSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Content store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Base URL of the cloud-disk REST API
    pub base_url: String,

    /// OAuth token for the disk account
    pub token: String,

    /// Folder on the disk all content paths are rooted under
    pub root_folder: String,

    /// Local directory downloads are saved into
    pub download_dir: PathBuf,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Messaging channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Bot API base URL
    pub api_url: String,

    /// Bot token
    pub token: String,

    /// Channel uploads go to first for a reusable transfer id (optional)
    pub cache_channel: Option<i64>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum sends per second
    pub sends_per_second: u32,
}

/// Delivery behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Delay between consecutive binary sends, in milliseconds
    pub pacing_delay_ms: u64,

    /// Retry budget for transient failures
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,

    /// Extra flat delay after a connection reset, in milliseconds
    pub reset_extra_delay_ms: u64,
}

/// Durable state file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    /// Subscriber roster document
    pub roster_path: PathBuf,

    /// Transfer-id cache document
    pub cache_path: PathBuf,

    /// Delivery failure ledger document
    pub ledger_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DRIPFEED_DISK_URL") {
            config.store.base_url = url;
        }
        if let Ok(token) = std::env::var("DRIPFEED_DISK_TOKEN") {
            config.store.token = token;
        }
        if let Ok(folder) = std::env::var("DRIPFEED_DISK_ROOT") {
            config.store.root_folder = folder;
        }
        if let Ok(dir) = std::env::var("DRIPFEED_DOWNLOAD_DIR") {
            config.store.download_dir = dir.into();
        }

        if let Ok(url) = std::env::var("DRIPFEED_BOT_API_URL") {
            config.channel.api_url = url;
        }
        if let Ok(token) = std::env::var("DRIPFEED_BOT_TOKEN") {
            config.channel.token = token;
        }
        if let Some(id) = std::env::var("DRIPFEED_CACHE_CHANNEL")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config.channel.cache_channel = Some(id);
        }

        if let Ok(time) = std::env::var("DRIPFEED_TRIGGER_TIME") {
            config.scheduler.trigger_time = time;
        }

        if let Ok(path) = std::env::var("DRIPFEED_ROSTER_PATH") {
            config.state.roster_path = path.into();
        }
        if let Ok(path) = std::env::var("DRIPFEED_CACHE_PATH") {
            config.state.cache_path = path.into();
        }
        if let Ok(path) = std::env::var("DRIPFEED_LEDGER_PATH") {
            config.state.ledger_path = path.into();
        }

        if let Ok(level) = std::env::var("DRIPFEED_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("DRIPFEED_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.scheduler
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        if self.channel.sends_per_second == 0 {
            anyhow::bail!("sends_per_second must be greater than 0");
        }

        if self.delivery.base_delay_ms > self.delivery.max_delay_ms {
            anyhow::bail!("base_delay_ms must not exceed max_delay_ms");
        }

        Ok(())
    }

    /// Content store client configuration
    pub fn disk_config(&self) -> DiskConfig {
        DiskConfig::new(&self.store.base_url, &self.store.token)
            .with_root_folder(&self.store.root_folder)
            .with_download_dir(&self.store.download_dir)
            .with_timeout(self.store.timeout_secs)
    }

    /// Messaging channel client configuration
    pub fn bot_config(&self) -> BotConfig {
        BotConfig::new(&self.channel.api_url, &self.channel.token)
            .with_timeout(self.channel.timeout_secs)
            .with_sends_per_second(self.channel.sends_per_second)
    }

    /// Deliverer configuration
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            pacing_delay_ms: self.delivery.pacing_delay_ms,
            retry: RetryConfig {
                max_retries: self.delivery.max_retries,
                base_delay_ms: self.delivery.base_delay_ms,
                max_delay_ms: self.delivery.max_delay_ms,
                backoff_multiplier: 2.0,
                reset_extra_delay_ms: self.delivery.reset_extra_delay_ms,
            },
            cache_channel: self.channel.cache_channel,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                base_url: String::from("https://cloud-api.yandex.net/v1/disk"),
                token: String::new(),
                root_folder: String::from("bot"),
                download_dir: PathBuf::from("downloads"),
                timeout_secs: 30,
            },
            channel: ChannelSettings {
                api_url: String::from("https://api.telegram.org"),
                token: String::new(),
                cache_channel: None,
                timeout_secs: 120,
                sends_per_second: 1,
            },
            delivery: DeliverySettings {
                pacing_delay_ms: 500,
                max_retries: 3,
                base_delay_ms: 1000,
                max_delay_ms: 30_000,
                reset_extra_delay_ms: 5000,
            },
            scheduler: TriggerConfig::default(),
            state: StateSettings {
                roster_path: PathBuf::from("roster.json"),
                cache_path: PathBuf::from("transfer_cache.json"),
                ledger_path: PathBuf::from("error_ledger.json"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
