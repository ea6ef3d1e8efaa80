//! Serial channel backed by tokio-serial.
//!
//! Opens a real port with the requested line parameters and exposes it as a
//! [`SerialChannel`]. The stream is split into reader/writer halves for the
//! adapter's endpoints; a cloned native handle is kept for clearing the
//! receive queue, which doesn't go through the halves.
//!
//! Read and write deadlines are enforced by the adapter only. The async
//! stream never consults a driver timeout, so the channel just records the
//! values it is given.
//!
//! tokio-serial reports no out-of-band framing, parity or overrun errors, so
//! this channel offers no fault stream and the adapter's fault watcher never
//! starts for it.
//!
//! Note: This module is gated behind the `async-serial` feature flag.

use super::error::PortError;
use super::timeout::Timeout;
use super::traits::{DataBits, FlowControl, Parity, PortConfiguration, SerialChannel, StopBits};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPort, SerialStream};
use tracing::debug;

/// Native async serial channel.
pub struct TokioSerialChannel {
    name: String,
    config: PortConfiguration,
    stream: Option<SerialStream>,
    control: Option<Box<dyn SerialPort>>,
    read_timeout: Timeout,
    write_timeout: Timeout,
    open: bool,
}

impl TokioSerialChannel {
    /// Open a serial port with async I/O support.
    ///
    /// Must be called within a Tokio runtime context; the stream registers
    /// with that runtime's reactor.
    ///
    /// # Example
    /// ```no_run
    /// use serial_stream_adapter::port::{PortConfiguration, TokioSerialChannel};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = PortConfiguration {
    ///     baud_rate: 19200,
    ///     ..Default::default()
    /// };
    /// let channel = TokioSerialChannel::open("/dev/ttyUSB0", &config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let builder = tokio_serial::new(port_name, config.baud_rate)
            .data_bits(convert_data_bits(config.data_bits))
            .flow_control(convert_flow_control(config.flow_control))
            .parity(convert_parity(config.parity))
            .stop_bits(convert_stop_bits(config.stop_bits));

        let stream = SerialStream::open(&builder).map_err(|e| map_open_error(port_name, e))?;

        let control = match stream.try_clone() {
            Ok(control) => Some(control),
            Err(e) => {
                debug!(port = port_name, error = %e, "no control handle; input clearing disabled");
                None
            }
        };

        debug!(port = port_name, baud = config.baud_rate, "serial channel opened");
        Ok(Self {
            name: port_name.to_string(),
            config: config.clone(),
            stream: Some(stream),
            control,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            open: true,
        })
    }

    /// Line parameters the port was opened with.
    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

}

impl SerialChannel for TokioSerialChannel {
    type Reader = ReadHalf<SerialStream>;
    type Writer = WriteHalf<SerialStream>;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn take_endpoints(&mut self) -> Result<(Self::Reader, Self::Writer), PortError> {
        let stream = self.stream.take().ok_or(PortError::EndpointsTaken)?;
        Ok(tokio::io::split(stream))
    }

    fn read_timeout(&self) -> Timeout {
        self.read_timeout
    }

    fn write_timeout(&self) -> Timeout {
        self.write_timeout
    }

    fn set_read_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        self.write_timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        if let Some(control) = self.control.as_ref() {
            control
                .clear(tokio_serial::ClearBuffer::Input)
                .map_err(io_error)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), PortError> {
        self.stream = None;
        self.control = None;
        self.open = false;
        debug!(port = %self.name, "serial channel closed");
        Ok(())
    }
}

impl std::fmt::Debug for TokioSerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSerialChannel")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("open", &self.open)
            .finish()
    }
}

fn map_open_error(port_name: &str, e: tokio_serial::Error) -> PortError {
    match e.kind {
        tokio_serial::ErrorKind::NoDevice
        | tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            PortError::not_found(port_name)
        }
        tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        _ => io_error(e),
    }
}

fn io_error(e: tokio_serial::Error) -> PortError {
    PortError::Io(std::io::Error::other(e.to_string()))
}

// Helper conversion functions for tokio-serial types

fn convert_data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn convert_flow_control(flow: FlowControl) -> tokio_serial::FlowControl {
    match flow {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Software => tokio_serial::FlowControl::Software,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}

fn convert_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn convert_stop_bits(stop_bits: StopBits) -> tokio_serial::StopBits {
    match stop_bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}
