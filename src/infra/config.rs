//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::reading::DeviceTopics;
use crate::domain::types::TRACK_GAUGE_IN;
use crate::services::clearance::DEFAULT_DATUM_Y_IN;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_host")]
    pub host: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub topics: DeviceTopics,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_device_host(),
            port: default_device_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            username: None,
            password: None,
            topics: DeviceTopics::default(),
        }
    }
}

fn default_device_host() -> String {
    "localhost".to_string()
}

fn default_device_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "clearance-verify".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeConfig {
    /// Reference table: `id,x,y,division` with a header row
    #[serde(default = "default_envelope_file")]
    pub file: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self { file: default_envelope_file() }
    }
}

fn default_envelope_file() -> String {
    "data/envelope.csv".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearanceConfig {
    /// End of the vertical clearance ray (rail-head datum), inches
    #[serde(default = "default_datum_y_in")]
    pub datum_y_in: f64,
    /// Track gauge for the super-elevation offset, inches
    #[serde(default = "default_gauge_in")]
    pub gauge_in: f64,
}

impl Default for ClearanceConfig {
    fn default() -> Self {
        Self { datum_y_in: default_datum_y_in(), gauge_in: default_gauge_in() }
    }
}

fn default_datum_y_in() -> f64 {
    DEFAULT_DATUM_Y_IN
}

fn default_gauge_in() -> f64 {
    TRACK_GAUGE_IN
}

/// Region around the device where the rangefinder sees its own frame
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Deadzone {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for Deadzone {
    fn default() -> Self {
        Self { x_min: -60.0, x_max: 60.0, y_min: 0.0, y_max: 10.0 }
    }
}

impl Deadzone {
    /// Strictly inside the dead-zone
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x_min < x && x < self.x_max && self.y_min < y && y < self.y_max
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub deadzone: Deadzone,
    /// Log a clearance summary every N accepted points (0 to disable)
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { deadzone: Deadzone::default(), progress_every: default_progress_every() }
    }
}

fn default_progress_every() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    /// File path for profile records (JSONL format)
    #[serde(default = "default_records_file")]
    pub records_file: String,
    /// Directory for per-profile clearance reports
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self { records_file: default_records_file(), reports_dir: default_reports_dir() }
    }
}

fn default_records_file() -> String {
    "profiles.jsonl".to_string()
}

fn default_reports_dir() -> String {
    "reports".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Bounded reading channel between ingest and session
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

fn default_channel_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub envelope: EnvelopeConfig,
    #[serde(default)]
    pub clearance: ClearanceConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    device_host: String,
    device_port: u16,
    client_id: String,
    keep_alive_secs: u64,
    device_username: Option<String>,
    device_password: Option<String>,
    topics: DeviceTopics,
    envelope_file: String,
    datum_y_in: f64,
    gauge_in: f64,
    deadzone: Deadzone,
    progress_every: u64,
    records_file: String,
    reports_dir: String,
    metrics_interval_secs: u64,
    channel_capacity: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            device_host: toml_config.device.host,
            device_port: toml_config.device.port,
            client_id: toml_config.device.client_id,
            keep_alive_secs: toml_config.device.keep_alive_secs,
            device_username: toml_config.device.username,
            device_password: toml_config.device.password,
            topics: toml_config.device.topics,
            envelope_file: toml_config.envelope.file,
            datum_y_in: toml_config.clearance.datum_y_in,
            gauge_in: toml_config.clearance.gauge_in,
            deadzone: toml_config.scan.deadzone,
            progress_every: toml_config.scan.progress_every,
            records_file: toml_config.egress.records_file,
            reports_dir: toml_config.egress.reports_dir,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            channel_capacity: toml_config.session.channel_capacity,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn device_host(&self) -> &str {
        &self.device_host
    }

    pub fn device_port(&self) -> u16 {
        self.device_port
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keep_alive_secs(&self) -> u64 {
        self.keep_alive_secs
    }

    pub fn device_username(&self) -> Option<&str> {
        self.device_username.as_deref()
    }

    pub fn device_password(&self) -> Option<&str> {
        self.device_password.as_deref()
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    pub fn envelope_file(&self) -> &str {
        &self.envelope_file
    }

    pub fn datum_y_in(&self) -> f64 {
        self.datum_y_in
    }

    pub fn gauge_in(&self) -> f64 {
        self.gauge_in
    }

    pub fn deadzone(&self) -> &Deadzone {
        &self.deadzone
    }

    pub fn progress_every(&self) -> u64 {
        self.progress_every
    }

    pub fn records_file(&self) -> &str {
        &self.records_file
    }

    pub fn reports_dir(&self) -> &str {
        &self.reports_dir
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set progress_every
    #[cfg(test)]
    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    /// Builder method for tests to set the dead-zone
    #[cfg(test)]
    pub fn with_deadzone(mut self, deadzone: Deadzone) -> Self {
        self.deadzone = deadzone;
        self
    }
}
