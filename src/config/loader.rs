//! Configuration loader with file resolution and environment overrides.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const ENV_PREFIX: &str = "FIRMATA_HOST";

const CONFIG_FILE_NAME: &str = "firmata-host.toml";

const CONFIG_PATH_ENV: &str = "FIRMATA_HOST_CONFIG";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path, if a file was used.
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigLoader {
    /// Load from the first config file found by [`resolve_config_path`], or
    /// defaults when there is none, then apply environment overrides.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides. Malformed overrides are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(err) = apply_env_overrides(&mut config) {
            tracing::warn!(%err, "ignoring environment override");
        }

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Write back to the file this configuration was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoConfigPath)?;

        save_to_file(&self.config, path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// First existing file among `$FIRMATA_HOST_CONFIG`, `./firmata-host.toml`
/// and the platform config directory.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this application.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "firmata-host").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::Parse)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse `FIRMATA_HOST_<key>` if it is set.
fn env_value<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    let var = format!("{ENV_PREFIX}_{key}");
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(format!("{ENV_PREFIX}_{key}"))
        .ok()
        .map(|val| val.eq_ignore_ascii_case("true") || val == "1")
}

/// Apply `FIRMATA_HOST_<SECTION>_<KEY>` overrides, e.g.
/// `FIRMATA_HOST_SERIAL_BAUD_RATE=115200` or
/// `FIRMATA_HOST_HANDSHAKE_ANALOG_PINS=14,15,16`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_SERIAL_PORT")) {
        config.serial.port = Some(val);
    }
    if let Some(baud) = env_value("SERIAL_BAUD_RATE", "baud rate")? {
        config.serial.baud_rate = baud;
    }
    if let Some(ms) = env_value("SERIAL_READ_TIMEOUT_MS", "timeout")? {
        config.serial.read_timeout_ms = ms;
    }

    let handshake = &mut config.handshake;
    if let Some(ms) = env_value("HANDSHAKE_REPORT_VERSION_TIMEOUT_MS", "timeout")? {
        handshake.report_version_timeout_ms = ms;
    }
    if let Some(retries) = env_value("HANDSHAKE_MAX_RETRIES", "retry count")? {
        handshake.max_retries = Some(retries);
    }
    if let Some(skip) = env_bool("HANDSHAKE_SKIP_CAPABILITIES") {
        handshake.skip_capabilities = skip;
    }
    if let Some(interval) = env_value("HANDSHAKE_SAMPLING_INTERVAL", "sampling interval")? {
        handshake.sampling_interval = Some(interval);
    }
    if let Some(count) = env_value("HANDSHAKE_PIN_COUNT", "pin count")? {
        handshake.pin_count = Some(count);
    }
    let var = format!("{ENV_PREFIX}_HANDSHAKE_ANALOG_PINS");
    if let Ok(val) = std::env::var(&var) {
        let pins = val
            .split(',')
            .map(|pin| pin.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::env_parse(var, "Expected comma-separated pin numbers"))?;
        handshake.analog_pins = Some(pins);
    }

    if let Ok(val) = std::env::var(format!("{ENV_PREFIX}_LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    let var = format!("{ENV_PREFIX}_LOGGING_FORMAT");
    if let Ok(val) = std::env::var(&var) {
        config.logging.format = val
            .parse()
            .map_err(|message: String| ConfigError::env_parse(var, message))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial(config_env)]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud_rate, 57_600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial(config_env)]
    fn test_env_override() {
        env::set_var("FIRMATA_HOST_SERIAL_BAUD_RATE", "115200");
        env::set_var("FIRMATA_HOST_HANDSHAKE_ANALOG_PINS", "14, 15,16");
        env::set_var("FIRMATA_HOST_LOGGING_FORMAT", "json");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud_rate, 115_200);
        assert_eq!(loader.config().handshake.analog_pins, Some(vec![14, 15, 16]));
        assert_eq!(loader.config().logging.format, LogFormat::Json);

        env::remove_var("FIRMATA_HOST_SERIAL_BAUD_RATE");
        env::remove_var("FIRMATA_HOST_HANDSHAKE_ANALOG_PINS");
        env::remove_var("FIRMATA_HOST_LOGGING_FORMAT");
    }

    #[test]
    #[serial(config_env)]
    fn test_bad_env_value_is_reported() {
        env::set_var("FIRMATA_HOST_HANDSHAKE_MAX_RETRIES", "lots");
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(err.to_string().contains("FIRMATA_HOST_HANDSHAKE_MAX_RETRIES"));
        env::remove_var("FIRMATA_HOST_HANDSHAKE_MAX_RETRIES");
    }

    #[test]
    #[serial(config_env)]
    fn test_load_from_file_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firmata-host.toml");
        std::fs::write(
            &path,
            "[serial]\nport = \"/dev/ttyUSB0\"\n\n[handshake]\nmax_retries = 2\n",
        )
        .unwrap();

        let mut loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config().serial.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(loader.config().handshake.max_retries, Some(2));

        loader.config_mut().handshake.skip_capabilities = true;
        let copy = dir.path().join("nested").join("copy.toml");
        loader.save_to(&copy).unwrap();
        let reloaded = ConfigLoader::load_from(&copy).unwrap();
        assert!(reloaded.config().handshake.skip_capabilities);
    }

    #[test]
    #[serial(config_env)]
    fn test_missing_file() {
        let err = ConfigLoader::load_from("/nonexistent/firmata-host.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    #[serial(config_env)]
    fn test_explicit_path_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[serial]\nbaud_rate = 9600\n").unwrap();

        env::set_var(CONFIG_PATH_ENV, &path);
        let loader = ConfigLoader::load().unwrap();
        env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(loader.config().serial.baud_rate, 9600);
    }
}
