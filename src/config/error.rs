//! Errors raised while loading, validating and saving `firmata-host.toml`.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the configuration layer, before any port is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file exists but could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not TOML, or a `[serial]`/`[handshake]`/`[logging]` key has the wrong type.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The in-memory config could not be rendered back to TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The config file or its parent directory could not be written.
    #[error("Failed to write config file '{path}': {source}")]
    Write {
        /// File or directory that was being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A value no session could run with, e.g. a zero baud rate.
    #[error("Invalid value for '{key}': {message}")]
    Invalid {
        /// Dotted key, such as `handshake.pin_count`.
        key: String,
        /// What is wrong with the value.
        message: String,
    },

    /// A `FIRMATA_HOST_<SECTION>_<KEY>` override that does not parse.
    #[error("Failed to parse environment override '{var}': {message}")]
    EnvOverride {
        /// Name of the environment variable.
        var: String,
        /// What was expected instead.
        message: String,
    },

    /// Neither `--port` nor `serial.port` names a device.
    #[error("Missing required configuration: serial port (--port or serial.port)")]
    NoSerialPort,

    /// `save` was called on a config that was not loaded from a file.
    #[error("No config file to save to")]
    NoConfigPath,
}

impl ConfigError {
    /// Create an [`ConfigError::Invalid`] for `key`.
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an [`ConfigError::EnvOverride`] for `var`.
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvOverride {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
