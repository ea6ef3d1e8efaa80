//! Serial port enumeration and lookup by human-readable name.
//!
//! USB adapters are usually known by their product string ("USB-RS485
//! Cable") rather than by the device path the OS assigned this time, so
//! lookups accept either.

use super::error::PortError;
use serde::Serialize;
use tracing::debug;

/// Kind of hardware behind a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

/// One enumerated serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// System path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port_name: String,
    /// Product string when the device reports one, else the system path.
    pub display_name: String,
    pub kind: PortKind,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl From<serialport::SerialPortInfo> for PortDescriptor {
    fn from(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                display_name: usb.product.clone().unwrap_or_else(|| info.port_name.clone()),
                port_name: info.port_name,
                kind: PortKind::Usb,
                manufacturer: usb.manufacturer,
                serial_number: usb.serial_number,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
            },
            other => Self {
                display_name: info.port_name.clone(),
                port_name: info.port_name,
                kind: match other {
                    serialport::SerialPortType::PciPort => PortKind::Pci,
                    serialport::SerialPortType::BluetoothPort => PortKind::Bluetooth,
                    _ => PortKind::Unknown,
                },
                manufacturer: None,
                serial_number: None,
                vid: None,
                pid: None,
            },
        }
    }
}

/// Enumerate the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<PortDescriptor>, PortError> {
    let ports: Vec<PortDescriptor> = serialport::available_ports()?
        .into_iter()
        .map(PortDescriptor::from)
        .collect();
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports)
}

/// Pick a port by system path, falling back to a case-insensitive match on
/// the display name.
pub fn select<'a>(ports: &'a [PortDescriptor], name: &str) -> Option<&'a PortDescriptor> {
    ports
        .iter()
        .find(|p| p.port_name == name)
        .or_else(|| {
            ports
                .iter()
                .find(|p| p.display_name.eq_ignore_ascii_case(name))
        })
}

/// Locate a port on this machine by system path or display name.
pub fn find_by_display_name(name: &str) -> Result<PortDescriptor, PortError> {
    let ports = available_ports()?;
    select(&ports, name)
        .cloned()
        .ok_or_else(|| PortError::not_found(name))
}
