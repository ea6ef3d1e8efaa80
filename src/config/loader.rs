//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_ADAPTER";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-adapter.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_ADAPTER_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_ADAPTER_CONFIG` environment variable (explicit path)
    /// 2. `./serial-adapter.toml` (current directory)
    /// 3. the platform config directory (`~/.config/serial-adapter/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
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

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are applied; if any of them fails to parse, a
    /// warning is logged and none are applied.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(e) = apply_env_overrides(&mut config) {
            warn!(error = %e, "ignoring environment overrides; using built-in defaults");
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoPath)?;
        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
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

/// Platform config directory for this tool.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-adapter").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    Ok(toml::from_str(&content)?)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(path, e))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Parse `SERIAL_ADAPTER_<key>` into `T` if it is set.
fn env_value<T: FromStr>(key: &str) -> ConfigResult<Option<T>> {
    let var = format!("{ENV_PREFIX}_{key}");
    match std::env::var(&var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_ADAPTER_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_ADAPTER_SERIAL_PORT=/dev/ttyUSB0`
/// - `SERIAL_ADAPTER_SERIAL_READ_TIMEOUT=infinite`
/// - `SERIAL_ADAPTER_LOGGING_FORMAT=json`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some(port) = env_value::<String>("SERIAL_PORT")? {
        config.serial.port = Some(port);
    }
    if let Some(baud) = env_value("SERIAL_BAUD_RATE")? {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout) = env_value("SERIAL_READ_TIMEOUT")? {
        config.serial.read_timeout = timeout;
    }
    if let Some(timeout) = env_value("SERIAL_WRITE_TIMEOUT")? {
        config.serial.write_timeout = timeout;
    }

    if let Some(threads) = env_value("ADAPTER_WORKER_THREADS")? {
        config.adapter.worker_threads = threads;
    }
    if let Some(chunk) = env_value("ADAPTER_READ_CHUNK")? {
        config.adapter.read_chunk = chunk;
    }

    if let Some(level) = env_value("LOGGING_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = env_value("LOGGING_FORMAT")? {
        config.logging.format = format;
    }
    if let Some(file) = env_value::<PathBuf>("LOGGING_FILE")? {
        config.logging.file = Some(file);
    }

    Ok(())
}
