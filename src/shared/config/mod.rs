//! Live-update configuration
//!
//! Provides [`LiveConfig`], the settings shared by every process of a
//! deployment: which process this is, where its siblings listen for control
//! pings, where the connection registry lives, and the timer ranges driving
//! heartbeats, forced refreshes and the reaper.
//!
//! # Sources
//!
//! Configuration is layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file named by `LIVE_CONFIG` (durations in milliseconds)
//! 3. Environment variables (`LIVE_VERSION`, `LIVE_PROCESS_INDEX`,
//!    `LIVE_PROCESS_COUNT`, `LIVE_HTTP_PORT_BASE`, `LIVE_CONTROL_PORT_BASE`,
//!    `DATABASE_URL`)
//!
//! ```toml
//! process_count = 4
//! control_port_base = 6000
//! heartbeat_ms = [15000, 20000]
//! notify_debounce_ms = 3000
//! ```

use crate::shared::jitter::JitterRange;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Settings for one process of a live-update deployment
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Server build identifier sent in the `Version` header
    pub version: String,
    /// Index of this process (0-based); process 0 runs the expiry reaper
    pub process_index: u16,
    /// Number of processes sharing the registry
    pub process_count: u16,
    /// Public HTTP port of process 0; process `i` listens on `base + i`
    pub http_port_base: u16,
    /// Loopback control port of process 0; process `i` listens on `base + i`
    pub control_port_base: u16,
    /// Registry location (`sqlite://...`)
    pub database_url: String,
    /// Interval between blank heartbeat lines on a stream
    pub heartbeat: JitterRange,
    /// Interval between forced self re-renders of a connection
    pub forced_refresh: JitterRange,
    /// Interval between expiry sweeps
    pub reaper: JitterRange,
    /// Interval between zombie cross-checks
    pub zombie_check: JitterRange,
    /// Spacing between consecutive pushes while draining
    pub push_spacing: JitterRange,
    /// Grace window for rows registered but not yet attached
    pub unattached_expiry: Duration,
    /// Delay before pinging siblings after a change
    pub notify_debounce: Duration,
    /// Timeout for one control ping
    pub ping_timeout: Duration,
    /// Largest rendered body accepted for a push
    pub max_render_bytes: usize,
    /// Explicit control endpoint of every process, indexed by process index;
    /// replaces the loopback `control_port_base + i` layout when set
    pub control_urls: Option<Vec<String>>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            process_index: 0,
            process_count: 1,
            http_port_base: 4000,
            control_port_base: 6000,
            database_url: "sqlite://live-updates.db".to_string(),
            heartbeat: JitterRange::from_secs(15, 20),
            forced_refresh: JitterRange::from_secs(270, 300),
            reaper: JitterRange::from_secs(55, 65),
            zombie_check: JitterRange::from_secs(55, 65),
            push_spacing: JitterRange::from_millis(80, 120),
            unattached_expiry: Duration::from_secs(5 * 60),
            notify_debounce: Duration::from_secs(3),
            ping_timeout: Duration::from_secs(2),
            max_render_bytes: 16 * 1024 * 1024,
            control_urls: None,
        }
    }
}

impl LiveConfig {
    /// Create a new LiveConfigBuilder
    pub fn builder() -> LiveConfigBuilder {
        LiveConfigBuilder::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of touching the
    /// real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = match lookup("LIVE_CONFIG") {
            Some(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                LiveConfigBuilder::from_toml_str(&contents)?
            }
            None => LiveConfigBuilder::default(),
        };

        if let Some(version) = lookup("LIVE_VERSION") {
            builder = builder.version(version);
        }
        if let Some(value) = lookup("LIVE_PROCESS_INDEX") {
            builder = builder.process_index(parse_number("LIVE_PROCESS_INDEX", &value)?);
        }
        if let Some(value) = lookup("LIVE_PROCESS_COUNT") {
            builder = builder.process_count(parse_number("LIVE_PROCESS_COUNT", &value)?);
        }
        if let Some(value) = lookup("LIVE_HTTP_PORT_BASE") {
            builder = builder.http_port_base(parse_number("LIVE_HTTP_PORT_BASE", &value)?);
        }
        if let Some(value) = lookup("LIVE_CONTROL_PORT_BASE") {
            builder = builder.control_port_base(parse_number("LIVE_CONTROL_PORT_BASE", &value)?);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            builder = builder.database_url(url);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::MissingValue("version"));
        }
        if self.process_count == 0 {
            return Err(ConfigError::Invalid("process_count must be at least 1".to_string()));
        }
        if self.process_index >= self.process_count {
            return Err(ConfigError::Invalid(format!(
                "process_index {} is out of range for {} processes",
                self.process_index, self.process_count
            )));
        }
        if u32::from(self.control_port_base) + u32::from(self.process_count) > u32::from(u16::MAX) {
            return Err(ConfigError::Invalid("control ports overflow u16".to_string()));
        }
        if u32::from(self.http_port_base) + u32::from(self.process_count) > u32::from(u16::MAX) {
            return Err(ConfigError::Invalid("http ports overflow u16".to_string()));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("database_url"));
        }
        if let Some(urls) = &self.control_urls {
            if urls.len() != usize::from(self.process_count) {
                return Err(ConfigError::Invalid(format!(
                    "control_urls lists {} endpoints for {} processes",
                    urls.len(),
                    self.process_count
                )));
            }
        }
        for (name, range) in [
            ("heartbeat", self.heartbeat),
            ("forced_refresh", self.forced_refresh),
            ("reaper", self.reaper),
            ("zombie_check", self.zombie_check),
            ("push_spacing", self.push_spacing),
        ] {
            if !range.is_valid() {
                return Err(ConfigError::Invalid(format!("{} range is empty or inverted", name)));
            }
        }
        Ok(())
    }

    /// Whether this process runs the expiry reaper
    pub fn is_reaper_process(&self) -> bool {
        self.process_index == 0
    }

    /// Public HTTP port of this process
    pub fn http_port(&self) -> u16 {
        self.http_port_base + self.process_index
    }

    /// Loopback control port of this process
    pub fn control_port(&self) -> u16 {
        self.control_port_base + self.process_index
    }

    /// Control endpoints of every other process in the deployment
    pub fn sibling_control_urls(&self) -> Vec<String> {
        if let Some(urls) = &self.control_urls {
            return urls
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != usize::from(self.process_index))
                .map(|(_, url)| url.clone())
                .collect();
        }
        (0..self.process_count)
            .filter(|index| *index != self.process_index)
            .map(|index| {
                format!(
                    "http://127.0.0.1:{}/live-updates",
                    self.control_port_base + index
                )
            })
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Builder for LiveConfig
#[derive(Debug, Default)]
pub struct LiveConfigBuilder {
    config: LiveConfig,
}

/// TOML shape of the configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    version: Option<String>,
    process_index: Option<u16>,
    process_count: Option<u16>,
    http_port_base: Option<u16>,
    control_port_base: Option<u16>,
    database_url: Option<String>,
    heartbeat_ms: Option<[u64; 2]>,
    forced_refresh_ms: Option<[u64; 2]>,
    reaper_ms: Option<[u64; 2]>,
    zombie_check_ms: Option<[u64; 2]>,
    push_spacing_ms: Option<[u64; 2]>,
    unattached_expiry_ms: Option<u64>,
    notify_debounce_ms: Option<u64>,
    ping_timeout_ms: Option<u64>,
    max_render_bytes: Option<usize>,
    control_urls: Option<Vec<String>>,
}

fn range_ms([min, max]: [u64; 2]) -> JitterRange {
    JitterRange::from_millis(min, max)
}

impl LiveConfigBuilder {
    /// Start from the values in a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;
        let mut config = LiveConfig::default();

        if let Some(version) = raw.version {
            config.version = version;
        }
        if let Some(index) = raw.process_index {
            config.process_index = index;
        }
        if let Some(count) = raw.process_count {
            config.process_count = count;
        }
        if let Some(port) = raw.http_port_base {
            config.http_port_base = port;
        }
        if let Some(port) = raw.control_port_base {
            config.control_port_base = port;
        }
        if let Some(url) = raw.database_url {
            config.database_url = url;
        }
        if let Some(range) = raw.heartbeat_ms {
            config.heartbeat = range_ms(range);
        }
        if let Some(range) = raw.forced_refresh_ms {
            config.forced_refresh = range_ms(range);
        }
        if let Some(range) = raw.reaper_ms {
            config.reaper = range_ms(range);
        }
        if let Some(range) = raw.zombie_check_ms {
            config.zombie_check = range_ms(range);
        }
        if let Some(range) = raw.push_spacing_ms {
            config.push_spacing = range_ms(range);
        }
        if let Some(ms) = raw.unattached_expiry_ms {
            config.unattached_expiry = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.notify_debounce_ms {
            config.notify_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = raw.ping_timeout_ms {
            config.ping_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = raw.max_render_bytes {
            config.max_render_bytes = bytes;
        }
        if let Some(urls) = raw.control_urls {
            config.control_urls = Some(urls);
        }

        Ok(Self { config })
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn process_index(mut self, index: u16) -> Self {
        self.config.process_index = index;
        self
    }

    pub fn process_count(mut self, count: u16) -> Self {
        self.config.process_count = count;
        self
    }

    pub fn http_port_base(mut self, port: u16) -> Self {
        self.config.http_port_base = port;
        self
    }

    pub fn control_port_base(mut self, port: u16) -> Self {
        self.config.control_port_base = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    pub fn heartbeat(mut self, range: JitterRange) -> Self {
        self.config.heartbeat = range;
        self
    }

    pub fn forced_refresh(mut self, range: JitterRange) -> Self {
        self.config.forced_refresh = range;
        self
    }

    pub fn reaper(mut self, range: JitterRange) -> Self {
        self.config.reaper = range;
        self
    }

    pub fn zombie_check(mut self, range: JitterRange) -> Self {
        self.config.zombie_check = range;
        self
    }

    pub fn push_spacing(mut self, range: JitterRange) -> Self {
        self.config.push_spacing = range;
        self
    }

    pub fn unattached_expiry(mut self, expiry: Duration) -> Self {
        self.config.unattached_expiry = expiry;
        self
    }

    pub fn notify_debounce(mut self, debounce: Duration) -> Self {
        self.config.notify_debounce = debounce;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    pub fn control_urls(mut self, urls: Vec<String>) -> Self {
        self.config.control_urls = Some(urls);
        self
    }

    pub fn max_render_bytes(mut self, bytes: usize) -> Self {
        self.config.max_render_bytes = bytes;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<LiveConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}
