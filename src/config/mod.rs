//! Configuration module for serial-adapter.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_ADAPTER_CONFIG` environment variable (explicit path)
//! 2. `./serial-adapter.toml` (current directory)
//! 3. The platform config directory, e.g. `~/.config/serial-adapter/serial-adapter.toml`
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Values can be overridden via environment variables named
//! `SERIAL_ADAPTER_<SECTION>_<KEY>`, e.g. `SERIAL_ADAPTER_SERIAL_PORT=COM4` or
//! `SERIAL_ADAPTER_SERIAL_READ_TIMEOUT=infinite`.
//!
//! # Example
//!
//! ```toml
//! [serial]
//! port = "USB-RS485 Cable"
//! baud_rate = 9600
//! read_timeout = 1000
//! write_timeout = 1000
//!
//! [adapter]
//! input_mode = "partial"
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
