//! Configuration schema.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration.

use super::error::{ConfigError, ConfigResult};
use crate::board::{BoardOptions, MAX_PINS};
use crate::port::PortConfiguration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub handshake: HandshakeConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values no session could run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be non-zero"));
        }
        if self.handshake.report_version_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "handshake.report_version_timeout_ms",
                "must be non-zero",
            ));
        }
        match self.handshake.pin_count {
            Some(0) => {
                return Err(ConfigError::validation("handshake.pin_count", "must be non-zero"));
            }
            Some(count) if count > MAX_PINS => {
                return Err(ConfigError::validation(
                    "handshake.pin_count",
                    format!("at most {MAX_PINS} pins are addressable"),
                ));
            }
            _ => {}
        }
        if let (Some(pins), Some(count)) = (&self.handshake.analog_pins, self.handshake.pin_count) {
            if let Some(&pin) = pins.iter().find(|&&pin| usize::from(pin) >= count) {
                return Err(ConfigError::validation(
                    "handshake.analog_pins",
                    format!("pin {pin} is outside a table of {count} pins"),
                ));
            }
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::validation("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

/// Transport section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path. Required by the binary, either here or on the command line.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 57_600,
            read_timeout_ms: 100,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            timeout: self.read_timeout(),
        }
    }
}

/// Session start-up section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    pub report_version_timeout_ms: u64,
    /// Absent means retry indefinitely.
    pub max_retries: Option<u32>,
    pub skip_capabilities: bool,
    pub sampling_interval: Option<u32>,
    pub analog_pins: Option<Vec<u8>>,
    pub pin_count: Option<usize>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            report_version_timeout_ms: 5000,
            max_retries: None,
            skip_capabilities: false,
            sampling_interval: None,
            analog_pins: None,
            pin_count: None,
        }
    }
}

impl From<&HandshakeConfig> for BoardOptions {
    fn from(config: &HandshakeConfig) -> Self {
        Self {
            report_version_timeout: Duration::from_millis(config.report_version_timeout_ms),
            max_retries: config.max_retries,
            skip_capabilities: config.skip_capabilities,
            sampling_interval: config.sampling_interval,
            analog_pins: config.analog_pins.clone(),
            pin_count: config.pin_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive. `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
