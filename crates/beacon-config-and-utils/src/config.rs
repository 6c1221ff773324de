//! Configuration management for the event pipeline.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default collector URL (can be overridden at compile time via BEACON_COLLECTOR_URL env var).
pub const DEFAULT_COLLECTOR_URL: &str = match option_env!("BEACON_COLLECTOR_URL") {
    Some(url) => url,
    None => "https://collector.beacon.dev",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Smallest accepted flush interval, in seconds.
pub const FLUSH_INTERVAL_MIN_SECS: f64 = 5.0;

/// Largest accepted flush interval, in seconds.
pub const FLUSH_INTERVAL_MAX_SECS: f64 = 60.0;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the remote collector.
    #[serde(default = "default_collector_url")]
    pub collector_url: String,
    /// Seconds between flush ticks.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: f64,
    /// Attempts made by a retry pass before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Seconds to wait between retry attempts.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Idle threshold in seconds. The idle monitor stays off when unset.
    #[serde(default)]
    pub idle_threshold_secs: Option<u64>,
    /// Collector request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on the location lookup, in milliseconds.
    #[serde(default = "default_location_timeout_ms")]
    pub location_timeout_ms: u64,
    /// Storage key holding the unsent events array.
    #[serde(default = "default_recovery_key")]
    pub recovery_key: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_collector_url() -> String {
    DEFAULT_COLLECTOR_URL.to_string()
}

fn default_flush_interval_secs() -> f64 {
    10.0
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_location_timeout_ms() -> u64 {
    3_000
}

fn default_recovery_key() -> String {
    "unsent_events".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            collector_url: default_collector_url(),
            flush_interval_secs: default_flush_interval_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_interval_secs: default_retry_interval_secs(),
            idle_threshold_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
            location_timeout_ms: default_location_timeout_ms(),
            recovery_key: default_recovery_key(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("BEACON_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(url) = std::env::var("BEACON_COLLECTOR_URL") {
            if !url.trim().is_empty() {
                self.collector_url = url.trim().to_string();
            }
        }
    }

    /// Get the collector URL as a parsed URL.
    pub fn collector_url(&self) -> CoreResult<Url> {
        Url::parse(&self.collector_url).map_err(CoreError::from)
    }

    /// Check the bounds the pipeline relies on.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.flush_interval_secs.is_finite()
            || self.flush_interval_secs < FLUSH_INTERVAL_MIN_SECS
            || self.flush_interval_secs > FLUSH_INTERVAL_MAX_SECS
        {
            return Err(CoreError::InvalidSetting(format!(
                "flush_interval_secs must be between {} and {}, got {}",
                FLUSH_INTERVAL_MIN_SECS, FLUSH_INTERVAL_MAX_SECS, self.flush_interval_secs
            )));
        }
        if self.retry_max_attempts == 0 {
            return Err(CoreError::InvalidSetting(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.idle_threshold_secs == Some(0) {
            return Err(CoreError::InvalidSetting(
                "idle_threshold_secs must be positive when set".to_string(),
            ));
        }
        if self.recovery_key.trim().is_empty() {
            return Err(CoreError::InvalidSetting("recovery_key must not be empty".to_string()));
        }
        self.collector_url()?;
        Ok(())
    }
}
