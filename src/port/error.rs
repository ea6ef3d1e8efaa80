//! Port-specific error types.
//!
//! Timeouts are the expected failure mode of the blocking adapter and are kept
//! distinct from "the call succeeded with zero bytes" and from channel faults.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial channel operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// A read did not complete before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A write did not complete before its deadline. `written` bytes had been
    /// accepted by the channel when the store was cancelled.
    #[error("Write timed out after {timeout:?} ({written} byte(s) accepted)")]
    WriteTimeout { timeout: Duration, written: usize },

    /// The adapter was disposed; no further calls are valid.
    #[error("Stream adapter has been disposed")]
    Disposed,

    /// Attempted to use a channel that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The caller's buffer cannot hold `offset + count` bytes.
    #[error("Buffer of {len} byte(s) too small for offset {offset} + count {count}")]
    InvalidBuffer {
        len: usize,
        offset: usize,
        count: usize,
    },

    /// The channel's reader/writer halves were already handed out.
    #[error("Channel endpoints were already taken")]
    EndpointsTaken,

    /// The background task ended without releasing the caller.
    #[error("Channel task ended before signalling completion")]
    TaskLost,

    /// A blocking call was made on the thread of a current-thread runtime.
    #[error("Blocking stream call made from a current-thread async runtime")]
    BlockingInAsyncContext,

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Returns `true` for both read and write deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::WriteTimeout { .. })
    }

    /// Returns `true` when the adapter can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disposed | Self::NotOpen | Self::TaskLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::Disposed;
        assert_eq!(err.to_string(), "Stream adapter has been disposed");

        let err = PortError::InvalidBuffer {
            len: 4,
            offset: 2,
            count: 4,
        };
        assert_eq!(
            err.to_string(),
            "Buffer of 4 byte(s) too small for offset 2 + count 4"
        );
    }

    #[test]
    fn test_timeout_error() {
        let duration = Duration::from_millis(500);
        let err = PortError::timeout(duration);
        assert!(err.to_string().contains("500ms"));
        assert!(err.is_timeout());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_write_timeout_reports_progress() {
        let err = PortError::WriteTimeout {
            timeout: Duration::from_millis(100),
            written: 3,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("3 byte(s) accepted"));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(PortError::Disposed.is_fatal());
        assert!(PortError::TaskLost.is_fatal());
        assert!(!PortError::Disposed.is_timeout());
    }
}
