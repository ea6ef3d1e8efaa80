//! Port abstraction layer for serial communication.
//!
//! Bridges asynchronous serial channels to the blocking, timeout-bounded
//! stream contract synchronous protocol transports expect, with a mock
//! channel for testing without hardware.

pub mod adapter;
mod bridge;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod mock;
pub mod timeout;
pub mod traits;

#[cfg(feature = "async-serial")]
pub mod tokio_channel;

pub use adapter::{AdapterSettings, BlockingStreamAdapter};
pub use discovery::{PortDescriptor, PortKind};
pub use endpoint::{InputEndpoint, InputStreamOptions, OutputEndpoint};
pub use error::PortError;
pub use mock::{MockChannel, MockDevice};
pub use timeout::Timeout;
pub use traits::*;

#[cfg(feature = "async-serial")]
pub use tokio_channel::TokioSerialChannel;
