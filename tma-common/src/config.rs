//! Configuration management for TMA tools.
//!
//! All tools share one configuration file at `~/.tma/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (TMA_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TMA_HOME` → home
//! - `TMA_SCKEY` → notification.sckey
//! - `TMA_LOG_LEVEL` → observability.log_level
//! - `TMA_LOG_FORMAT` → observability.log_format

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Get the default configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tma"),
        |dirs| dirs.home_dir().join(".tma"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base directory for data and pool files (defaults to `~/.tma`)
    #[serde(default)]
    pub home: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Push notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Indicator tunables
    #[serde(default)]
    pub indicator: IndicatorConfig,

    /// Market data collector settings
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Monitoring loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config from {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!("Failed to parse config from {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(home) = std::env::var("TMA_HOME") {
            self.home = Some(home);
        }

        if let Ok(key) = std::env::var("TMA_SCKEY") {
            if !key.trim().is_empty() {
                self.notification.sckey = Some(key);
            }
        }

        if let Ok(level) = std::env::var("TMA_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(format) = std::env::var("TMA_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Base directory, with `~` and environment variables expanded.
    pub fn home_dir(&self) -> PathBuf {
        match &self.home {
            Some(home) => PathBuf::from(shellexpand::full(home).map_or_else(
                |_| home.clone(),
                |expanded| expanded.into_owned(),
            )),
            None => config_dir(),
        }
    }

    /// Directory holding pool snapshots and history logs.
    pub fn pool_dir(&self) -> PathBuf {
        self.home_dir().join("pool")
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// ServerChan push notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// ServerChan send key; pushes fail with a configuration error when absent
    #[serde(default)]
    pub sckey: Option<String>,

    /// Push endpoint base URL
    #[serde(default = "default_sc_endpoint")]
    pub endpoint: String,

    /// Maximum delivery attempts per push
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sckey: None,
            endpoint: default_sc_endpoint(),
            retry_count: default_retry_count(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Indicator tunables.
///
/// The limit-band ratios are the multipliers applied to the settlement
/// price: an instrument touches limit-up when `high > settlement * limit_up_ratio`
/// and limit-down when `low < settlement * limit_down_ratio`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Limit-up band multiplier
    #[serde(default = "default_limit_up_ratio")]
    pub limit_up_ratio: f64,

    /// Limit-down band multiplier
    #[serde(default = "default_limit_down_ratio")]
    pub limit_down_ratio: f64,

    /// Trailing windows for moving averages (trading days)
    #[serde(default = "default_ma_windows")]
    pub ma_windows: Vec<usize>,

    /// Trailing windows for N-day extremes (trading days)
    #[serde(default = "default_nd_windows")]
    pub nd_windows: Vec<usize>,

    /// Number of highest-turnover instruments for the turnover breadth
    #[serde(default = "default_turnover_top")]
    pub turnover_top: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            limit_up_ratio: default_limit_up_ratio(),
            limit_down_ratio: default_limit_down_ratio(),
            ma_windows: default_ma_windows(),
            nd_windows: default_nd_windows(),
            turnover_top: default_turnover_top(),
        }
    }
}

/// Market data collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum symbols per batched quote request (upstream limit)
    #[serde(default = "default_quote_batch_size")]
    pub quote_batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            quote_batch_size: default_quote_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Monitoring loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between pool performance polls
    #[serde(default = "default_pool_interval")]
    pub pool_interval_secs: u64,

    /// Seconds between limit-board polls
    #[serde(default = "default_limit_interval")]
    pub limit_interval_secs: u64,

    /// Limit-board alert threshold in units of 10k CNY
    #[serde(default = "default_limit_threshold")]
    pub limit_threshold_wan: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pool_interval_secs: default_pool_interval(),
            limit_interval_secs: default_limit_interval(),
            limit_threshold_wan: default_limit_threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_sc_endpoint() -> String {
    "https://sc.ftqq.com".into()
}
fn default_retry_count() -> u32 {
    6
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_limit_up_ratio() -> f64 {
    1.095
}
fn default_limit_down_ratio() -> f64 {
    0.905
}
fn default_ma_windows() -> Vec<usize> {
    vec![5, 10, 20, 30, 60, 120, 240]
}
fn default_nd_windows() -> Vec<usize> {
    vec![5, 10, 20, 40, 60]
}
fn default_turnover_top() -> usize {
    50
}
fn default_quote_batch_size() -> usize {
    800
}
fn default_pool_interval() -> u64 {
    60
}
fn default_limit_interval() -> u64 {
    1
}
fn default_limit_threshold() -> f64 {
    10_000.0
}
