//! Core traits for serial channel abstraction.
//!
//! Two seams meet in this crate:
//!
//! - [`SerialChannel`] is what a channel provider hands in: an open,
//!   already-configured connection with asynchronous reader/writer halves.
//! - [`StreamResource`] is what a synchronous protocol transport consumes:
//!   blocking, timeout-governed read/write/discard/dispose.
//!
//! [`BlockingStreamAdapter`](super::BlockingStreamAdapter) turns the first
//! into the second.

use super::error::PortError;
use super::timeout::Timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// Line parameters applied by the channel provider before the adapter takes
/// ownership of the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Channel-level read timeout reported to the adapter as its default.
    pub read_timeout: Timeout,

    /// Channel-level write timeout reported to the adapter as its default.
    pub write_timeout: Timeout,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Timeout::Infinite,
            write_timeout: Timeout::Infinite,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    #[value(name = "5")]
    Five,
    #[value(name = "6")]
    Six,
    #[value(name = "7")]
    Seven,
    #[value(name = "8")]
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Hardware or driver level fault reported out-of-band by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFault {
    /// A character was received with an invalid stop bit.
    Frame,
    /// A character was received with a parity error.
    Parity,
    /// The hardware receive register was overrun.
    Overrun,
    /// The driver's receive buffer overflowed and bytes were dropped.
    BufferOverflow,
    /// Anything the driver reports that doesn't fit the above.
    Other(String),
}

impl fmt::Display for ChannelFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame => write!(f, "framing error"),
            Self::Parity => write!(f, "parity error"),
            Self::Overrun => write!(f, "receive overrun"),
            Self::BufferOverflow => write!(f, "receive buffer overflow"),
            Self::Other(detail) => write!(f, "{detail}"),
        }
    }
}

/// An open serial connection with asynchronous input and output halves.
///
/// Implementations are handed to the adapter already configured (baud rate,
/// parity and so on). The adapter takes the reader/writer halves once, at
/// construction, and keeps the channel itself for timeout propagation,
/// input clearing and closing.
pub trait SerialChannel: Send + fmt::Debug + 'static {
    /// Incoming byte stream.
    type Reader: AsyncRead + Unpin + Send + 'static;

    /// Outgoing byte stream.
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Get the name/path of this channel.
    fn name(&self) -> &str;

    /// Whether the connection is currently usable.
    fn is_open(&self) -> bool;

    /// Hand out the reader and writer halves. Succeeds at most once.
    fn take_endpoints(&mut self) -> Result<(Self::Reader, Self::Writer), PortError>;

    /// The channel's own read timeout, used as the adapter's initial value.
    fn read_timeout(&self) -> Timeout {
        Timeout::Infinite
    }

    /// The channel's own write timeout, used as the adapter's initial value.
    fn write_timeout(&self) -> Timeout {
        Timeout::Infinite
    }

    /// Apply a new read timeout to the underlying driver.
    fn set_read_timeout(&mut self, timeout: Timeout) -> Result<(), PortError>;

    /// Apply a new write timeout to the underlying driver.
    fn set_write_timeout(&mut self, timeout: Timeout) -> Result<(), PortError>;

    /// Drop whatever the driver has received but not yet delivered.
    ///
    /// Must not block. The default does nothing.
    fn clear_input(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Out-of-band fault notifications, if the driver reports any.
    ///
    /// Returns the receiving end at most once.
    fn take_faults(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelFault>> {
        None
    }

    /// Release the connection.
    fn close(&mut self) -> Result<(), PortError>;
}

/// Synchronous stream contract consumed by a protocol transport.
///
/// Every call blocks the calling thread until it completes or its deadline
/// elapses. Deadline expiry is reported as an error for which
/// [`PortError::is_timeout`] returns `true`; a read that legitimately finds
/// nothing buffered returns `Ok(0)` instead.
///
/// Every call takes `&mut self`, so one resource runs at most one call at a
/// time, even though reads and writes use independent endpoints underneath.
/// A request/response master never overlaps the two. A caller that needs a
/// read in flight during a write has to use two channels.
pub trait StreamResource: Send {
    /// The sentinel meaning "no deadline".
    fn infinite_timeout(&self) -> Timeout {
        Timeout::Infinite
    }

    /// Current read deadline.
    fn read_timeout(&self) -> Timeout;

    /// Change the read deadline. Redundant sets are no-ops.
    fn set_read_timeout(&mut self, timeout: Timeout) -> Result<(), PortError>;

    /// Current write deadline.
    fn write_timeout(&self) -> Timeout;

    /// Change the write deadline. Redundant sets are no-ops.
    fn set_write_timeout(&mut self, timeout: Timeout) -> Result<(), PortError>;

    /// Drop every byte received but not yet read. Never blocks.
    fn discard_in_buffer(&mut self) -> Result<(), PortError>;

    /// Read up to `count` bytes into `buffer[offset..offset + count]`.
    ///
    /// Returns the number of bytes copied.
    fn read(&mut self, buffer: &mut [u8], offset: usize, count: usize)
        -> Result<usize, PortError>;

    /// Transmit `buffer[offset..offset + count]`.
    fn write(&mut self, buffer: &[u8], offset: usize, count: usize) -> Result<(), PortError>;

    /// Release the channel. Safe to call more than once.
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.read_timeout, Timeout::Infinite);
        assert_eq!(config.write_timeout, Timeout::Infinite);
    }

    #[test]
    fn test_data_bits_conversion() {
        let bits = DataBits::Seven;
        let serialport_bits: serialport::DataBits = bits.into();
        assert_eq!(serialport_bits, serialport::DataBits::Seven);
    }

    #[test]
    fn test_parity_conversion() {
        let parity = Parity::Even;
        let serialport_parity: serialport::Parity = parity.into();
        assert_eq!(serialport_parity, serialport::Parity::Even);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let stop_bits = StopBits::Two;
        let serialport_stop_bits: serialport::StopBits = stop_bits.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }

    #[test]
    fn test_configuration_from_toml() {
        let config: PortConfiguration = toml::from_str(
            r#"
            baud_rate = 19200
            parity = "even"
            read_timeout = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.read_timeout, Timeout::Millis(1000));
        assert_eq!(config.write_timeout, Timeout::Infinite);
    }

    #[test]
    fn test_fault_display() {
        assert_eq!(ChannelFault::Frame.to_string(), "framing error");
        assert_eq!(
            ChannelFault::Other("break detected".into()).to_string(),
            "break detected"
        );
    }
}
