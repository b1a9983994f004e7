//! Configuration loading for the spooling pipeline.
//!
//! Strongly-typed configuration backed by Figment. Values are loaded from:
//! 1. a TOML file (`config/daq-spool.toml` by default)
//! 2. environment variables prefixed with `DAQ_SPOOL_`, nested with `__`
//!    (e.g. `DAQ_SPOOL_CONSUMER__BATCH_SIZE=50`)
//!
//! Every section and field has a default, so an absent file yields a usable
//! configuration; `validate` then rejects semantically bad values before any
//! channel is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpoolError};
use crate::sink::SinkFormat;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpoolConfig {
    /// Application settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Consumer loop settings, shared by every channel.
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Output settings for file-backed sinks.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Channel definitions.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// Application-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name, used in logs.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

/// Consumer loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Drain cadence in Hz.
    #[serde(default = "default_consumer_rate")]
    pub rate_hz: f64,
    /// Maximum samples removed per drain.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How long shutdown waits for a consumer's final drain.
    #[serde(default = "default_drain_timeout", with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_consumer_rate(),
            batch_size: default_batch_size(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

/// Output settings for file-backed sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for output files, created if missing.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// On-disk format.
    #[serde(default = "default_format")]
    pub format: SinkFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: default_format(),
        }
    }
}

/// One channel definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Identity, unique within the registry.
    pub id: u32,
    /// Human-readable name, used for log fields and output file names.
    pub name: String,
    /// Whether the producer appends samples; checked every cycle.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sample vector dimension, fixed for the channel's lifetime.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Buffer capacity in samples, fixed for the channel's lifetime.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Producer cadence in Hz.
    #[serde(default = "default_producer_rate")]
    pub producer_rate_hz: f64,
}

// Default value functions
fn default_app_name() -> String {
    "daq-spool".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_consumer_rate() -> f64 {
    200.0
}

fn default_batch_size() -> usize {
    100
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_format() -> SinkFormat {
    SinkFormat::Csv
}

fn default_enabled() -> bool {
    true
}

fn default_dimension() -> usize {
    1
}

fn default_capacity() -> usize {
    1024
}

fn default_producer_rate() -> f64 {
    1000.0
}

impl SpoolConfig {
    /// Load configuration from `config/daq-spool.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::ConfigLoad`] when the file or environment
    /// values fail to parse.
    pub fn load() -> Result<Self> {
        Self::load_from("config/daq-spool.toml")
    }

    /// Load configuration from a specific file path plus the environment.
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::ConfigLoad`] when parsing or extraction fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DAQ_SPOOL_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate values that parse but may still be semantically wrong.
    ///
    /// # Errors
    ///
    /// Returns [`SpoolError::Config`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(SpoolError::Config(format!(
                "invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.consumer.rate_hz <= 0.0 {
            return Err(SpoolError::Config(format!(
                "consumer rate_hz must be positive, got {}",
                self.consumer.rate_hz
            )));
        }
        if self.consumer.batch_size == 0 {
            return Err(SpoolError::Config(
                "consumer batch_size must be at least 1".to_string(),
            ));
        }

        let mut ids = std::collections::HashSet::new();
        for channel in &self.channels {
            if !ids.insert(channel.id) {
                return Err(SpoolError::Config(format!(
                    "duplicate channel id: {}",
                    channel.id
                )));
            }
            if channel.name.is_empty() {
                return Err(SpoolError::Config(format!(
                    "channel {} has an empty name",
                    channel.id
                )));
            }
            if channel.capacity == 0 {
                return Err(SpoolError::Config(format!(
                    "channel {} capacity must be at least 1",
                    channel.id
                )));
            }
            if channel.dimension == 0 {
                return Err(SpoolError::Config(format!(
                    "channel {} dimension must be at least 1",
                    channel.id
                )));
            }
            if channel.producer_rate_hz <= 0.0 {
                return Err(SpoolError::Config(format!(
                    "channel {} producer_rate_hz must be positive, got {}",
                    channel.id, channel.producer_rate_hz
                )));
            }
        }

        Ok(())
    }

    /// Channels with the enable flag set.
    #[must_use]
    pub fn enabled_channels(&self) -> Vec<&ChannelConfig> {
        self.channels.iter().filter(|ch| ch.enabled).collect()
    }
}
