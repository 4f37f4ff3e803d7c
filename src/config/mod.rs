//! TOML configuration with environment variable overrides.
//!
//! # Resolution
//!
//! 1. `FIRMATA_HOST_CONFIG` environment variable (explicit path)
//! 2. `./firmata-host.toml`
//! 3. `firmata-host.toml` in the platform config directory
//! 4. Built-in defaults
//!
//! # Environment overrides
//!
//! `FIRMATA_HOST_<SECTION>_<KEY>`, for example
//! `FIRMATA_HOST_SERIAL_PORT=/dev/ttyACM0` or
//! `FIRMATA_HOST_HANDSHAKE_SKIP_CAPABILITIES=true`.
//!
//! # Example
//!
//! ```rust,no_run
//! use firmata_host::board::BoardOptions;
//! use firmata_host::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let options = BoardOptions::from(&loader.config().handshake);
//! # Ok::<(), firmata_host::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, HandshakeConfig, LogFormat, LoggingConfig, SerialConfig};
