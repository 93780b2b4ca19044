//! Bot configuration

use config::{Config, Environment, File};
use nws_client::DEFAULT_BASE_URL;
use poll_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use webhook_notifier::{parse_webhook_url, WebhookConfig};

/// Config file read when `ALERT_BOT_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "alert-bot.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("WEBHOOK_URL is not set")]
    MissingWebhookUrl,

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("Invalid scheduler settings: {0}")]
    InvalidScheduler(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Poll cadence settings, in whole seconds/minutes for easy env overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub baseline_secs: u64,
    pub urgent_secs: u64,
    pub baseline_jitter_secs: u64,
    pub urgent_jitter_secs: u64,
    /// Lead time that makes an `Expected` alert urgent
    pub near_term_mins: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            baseline_secs: 300,
            urgent_secs: 60,
            baseline_jitter_secs: 15,
            urgent_jitter_secs: 10,
            near_term_mins: 30,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            baseline_interval: Duration::from_secs(settings.baseline_secs),
            urgent_interval: Duration::from_secs(settings.urgent_secs),
            baseline_jitter: Duration::from_secs(settings.baseline_jitter_secs),
            urgent_jitter: Duration::from_secs(settings.urgent_jitter_secs),
            near_term: Duration::from_secs(settings.near_term_mins * 60),
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Webhook URL including its token
    pub webhook_url: String,

    /// File listing the zones to watch, one per line
    pub zones_file: PathBuf,

    /// NWS API root
    pub nws_base_url: String,

    /// User-Agent sent to the NWS API, which expects contact details
    pub user_agent: String,

    pub log_format: LogFormat,

    /// Prometheus listener address; metrics are not exported when unset
    pub metrics_addr: Option<String>,

    pub scheduler: SchedulerSettings,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            zones_file: PathBuf::from("zones.txt"),
            nws_base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("nws-alert-bot/{}", env!("CARGO_PKG_VERSION")),
            log_format: LogFormat::Pretty,
            metrics_addr: None,
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl BotConfig {
    /// Load from defaults, the config file and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("ALERT_BOT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(&file), Environment::default())
    }

    /// Layer `file` (optional on disk) and `env` over the defaults, then validate
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: Self = builder
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check the settings a tick depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_url.trim().is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        parse_webhook_url(self.webhook_url.trim())
            .map_err(|e| ConfigError::InvalidWebhookUrl(e.to_string()))?;

        let s = &self.scheduler;
        if s.urgent_secs == 0 || s.baseline_secs == 0 {
            return Err(ConfigError::InvalidScheduler(
                "intervals must be positive".to_string(),
            ));
        }
        if s.urgent_secs > s.baseline_secs {
            return Err(ConfigError::InvalidScheduler(format!(
                "urgent interval {}s exceeds baseline {}s",
                s.urgent_secs, s.baseline_secs
            )));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::from(&self.scheduler)
    }

    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig::new(self.webhook_url.trim())
    }
}
