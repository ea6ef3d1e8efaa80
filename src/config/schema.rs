//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{
    AdapterSettings, DataBits, FlowControl, Parity, PortConfiguration, StopBits, Timeout,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line configuration
    pub serial: SerialConfig,
    /// Stream adapter tuning
    pub adapter: AdapterSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make the adapter unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation(
                "serial.baud_rate",
                "must be greater than zero",
            ));
        }
        if self.adapter.worker_threads == 0 {
            return Err(ConfigError::validation(
                "adapter.worker_threads",
                "must be at least 1",
            ));
        }
        if self.adapter.read_chunk == 0 {
            return Err(ConfigError::validation(
                "adapter.read_chunk",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Serial line section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port path, alias or device display name to open
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read deadline applied to the adapter once the port is open
    pub read_timeout: Timeout,
    /// Write deadline applied to the adapter once the port is open
    pub write_timeout: Timeout,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Timeout::Millis(1000),
            write_timeout: Timeout::Millis(1000),
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Line parameters for the channel provider. The channel itself starts
    /// with infinite timeouts; deadlines are set on the adapter.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            ..Default::default()
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Log file path (optional, stderr otherwise)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::InputStreamOptions;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout, Timeout::Millis(1000));
        assert_eq!(config.adapter.input_mode, InputStreamOptions::Partial);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_alias_resolution() {
        let mut config = SerialConfig::default();
        config
            .port_aliases
            .insert("rs485".to_string(), "/dev/ttyUSB0".to_string());

        assert_eq!(config.resolve_port("rs485"), "/dev/ttyUSB0");
        assert_eq!(config.resolve_port("COM5"), "COM5");
    }

    #[test]
    fn test_port_configuration_keeps_channel_timeouts_infinite() {
        let serial = SerialConfig {
            baud_rate: 19200,
            parity: Parity::Even,
            ..Default::default()
        };
        let line = serial.port_configuration();
        assert_eq!(line.baud_rate, 19200);
        assert_eq!(line.parity, Parity::Even);
        assert_eq!(line.read_timeout, Timeout::Infinite);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[adapter]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [serial]
            port = "USB-RS485 Cable"
            baud_rate = 19200
            read_timeout = "infinite"
            write_timeout = 250

            [adapter]
            input_mode = "none"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("USB-RS485 Cable"));
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.serial.read_timeout, Timeout::Infinite);
        assert_eq!(config.serial.write_timeout, Timeout::Millis(250));
        assert_eq!(config.adapter.input_mode, InputStreamOptions::None);
        // Defaults should still work
        assert_eq!(config.adapter.worker_threads, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_zero_baud() {
        let mut config = Config::default();
        config.serial.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("fancy".parse::<LogFormat>().is_err());
    }
}
