//! Serial Stream Adapter Library
//!
//! Presents an asynchronous serial channel as a blocking, timeout-bounded
//! byte stream for synchronous protocol transports such as Modbus RTU
//! masters.
//!
//! # Modules
//!
//! - `port`: channel traits, the blocking stream adapter, endpoints, the
//!   tokio-serial channel and a mock channel for tests
//! - `config`: Configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: Application-level error for the command-line front end

pub mod config;
pub mod error;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use error::AppError;
pub use port::{
    AdapterSettings, BlockingStreamAdapter, ChannelFault, DataBits, FlowControl,
    InputStreamOptions, MockChannel, MockDevice, Parity, PortConfiguration, PortError,
    SerialChannel, StopBits, StreamResource, Timeout,
};

#[cfg(feature = "async-serial")]
pub use port::TokioSerialChannel;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
