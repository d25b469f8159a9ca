//! Resource addresses and opening of interfaces from them.
//!
//! Instruments are addressed with VISA-style resource strings. The following forms are
//! understood:
//!
//! - `USB[board]::<vendor id>::<product id>::<serial>[::<interface>]::INSTR`
//! - `TCPIP[board]::<host>[::<lan device name>]::INSTR`, talking to the raw SCPI socket
//!   [`SCPI_RAW_PORT`] of the host
//! - `TCPIP[board]::<host>::<port>::SOCKET`
//! - `ASRL<port>::INSTR`, where the port is either a number or a device path
//!
//! Keywords are case-insensitive. Vendor and product ids can be given in decimal or with a `0x`
//! prefix in hexadecimal.

use std::{fmt::Display, str::FromStr, time::Duration};

use log::info;

use crate::{InstrumentError, InstrumentInterface, TcpIpInterface};

/// Port of the raw SCPI socket that is used for `TCPIP::<host>::INSTR` resources.
pub const SCPI_RAW_PORT: u16 = 5025;

/// The address of a USBTMC instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbAddress {
    /// Board index, i.e., the number after `USB`.
    pub board: u16,
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Serial number string of the device.
    pub serial: String,
    /// USB interface number, if given in the address.
    pub interface: Option<u8>,
}

impl Display for UsbAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "USB{}::0x{:04X}::0x{:04X}::{}::",
            self.board, self.vendor_id, self.product_id, self.serial
        )?;
        if let Some(iface) = self.interface {
            write!(f, "{iface}::")?;
        }
        write!(f, "INSTR")
    }
}

/// A parsed resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// An instrument connected via USBTMC.
    Usb(UsbAddress),
    /// An instrument connected via TCP/IP.
    TcpIp {
        /// Board index, i.e., the number after `TCPIP`.
        board: u16,
        /// Host name or IP address.
        host: String,
        /// Port of the SCPI socket.
        port: u16,
    },
    /// An instrument connected via a serial port.
    Serial {
        /// Name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
        port: String,
    },
}

impl FromStr for ResourceAddress {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InstrumentError::InvalidResource(s.to_string());
        let parts: Vec<&str> = s.trim().split("::").collect();
        let (first, rest) = parts.split_first().ok_or_else(invalid)?;
        let (class, fields) = rest.split_last().ok_or_else(invalid)?;
        let class = class.to_ascii_uppercase();
        let first_upper = first.to_ascii_uppercase();

        if let Some(board) = first_upper.strip_prefix("USB") {
            if class != "INSTR" || !(3..=4).contains(&fields.len()) {
                return Err(invalid());
            }
            let serial = fields[2].to_string();
            if serial.is_empty() {
                return Err(invalid());
            }
            let interface = match fields.get(3) {
                Some(iface) => Some(iface.parse::<u8>().map_err(|_| invalid())?),
                None => None,
            };
            Ok(ResourceAddress::Usb(UsbAddress {
                board: parse_board(board).ok_or_else(invalid)?,
                vendor_id: parse_id(fields[0]).ok_or_else(invalid)?,
                product_id: parse_id(fields[1]).ok_or_else(invalid)?,
                serial,
                interface,
            }))
        } else if let Some(board) = first_upper.strip_prefix("TCPIP") {
            let board = parse_board(board).ok_or_else(invalid)?;
            let host = fields.first().map(|h| h.trim()).unwrap_or_default();
            if host.is_empty() {
                return Err(invalid());
            }
            let port = match (class.as_str(), fields.len()) {
                ("INSTR", 1 | 2) => SCPI_RAW_PORT,
                ("SOCKET", 2) => fields[1].parse::<u16>().map_err(|_| invalid())?,
                _ => return Err(invalid()),
            };
            Ok(ResourceAddress::TcpIp {
                board,
                host: host.to_string(),
                port,
            })
        } else if first_upper.starts_with("ASRL") {
            if class != "INSTR" || !fields.is_empty() {
                return Err(invalid());
            }
            let port = &first[4..];
            if port.is_empty() {
                return Err(invalid());
            }
            Ok(ResourceAddress::Serial {
                port: serial_port_name(port),
            })
        } else {
            Err(invalid())
        }
    }
}

/// A USBTMC device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbResource {
    /// Resource address of the device, e.g., `USB0::0x0957::0x17BC::MY56310625::INSTR`.
    pub address: String,
    /// Manufacturer string descriptor, if it could be read.
    pub manufacturer: Option<String>,
    /// Product string descriptor, if it could be read.
    pub product: Option<String>,
    /// Serial number of the device. Empty if the device does not report one.
    pub serial: String,
}

impl UsbResource {
    /// Create a USB resource from its address alone, i.e., without any string descriptors.
    ///
    /// The serial number is taken from the address.
    pub fn new(address: &str) -> Self {
        UsbResource {
            address: address.to_string(),
            manufacturer: None,
            product: None,
            serial: address.split("::").nth(3).unwrap_or_default().to_string(),
        }
    }

    /// Strings that identify this device, in the order they should be matched.
    ///
    /// These are the serial number, followed by the product and manufacturer string descriptors
    /// if they are known.
    pub fn identities(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if !self.serial.is_empty() {
            ids.push(self.serial.as_str());
        }
        ids.extend(self.product.as_deref());
        ids.extend(self.manufacturer.as_deref());
        ids
    }
}

/// Open the interface that belongs to a resource address.
///
/// The returned interface is boxed, such that drivers can be written once for all transports.
/// The session is released when the interface is dropped.
///
/// # Arguments
/// * `resource` - A resource address, see the module documentation for the supported forms.
/// * `timeout` - Timeout for the connection and all reads and writes.
pub fn open_resource(
    resource: &str,
    timeout: Duration,
) -> Result<Box<dyn InstrumentInterface + Send>, InstrumentError> {
    info!("Opening resource {resource}");
    match resource.parse::<ResourceAddress>()? {
        ResourceAddress::TcpIp { host, port, .. } => Ok(Box::new(TcpIpInterface::timeout(
            (host.as_str(), port),
            timeout,
        )?)),
        ResourceAddress::Usb(address) => open_usb(&address, timeout),
        ResourceAddress::Serial { port } => open_serial(&port, timeout),
    }
}

#[cfg(feature = "usb")]
fn open_usb(
    address: &UsbAddress,
    timeout: Duration,
) -> Result<Box<dyn InstrumentInterface + Send>, InstrumentError> {
    Ok(Box::new(crate::UsbTmcInterface::open(address, timeout)?))
}

#[cfg(not(feature = "usb"))]
fn open_usb(
    _address: &UsbAddress,
    _timeout: Duration,
) -> Result<Box<dyn InstrumentInterface + Send>, InstrumentError> {
    Err(InstrumentError::InterfaceNotAvailable("usb"))
}

#[cfg(feature = "serial")]
fn open_serial(
    port: &str,
    timeout: Duration,
) -> Result<Box<dyn InstrumentInterface + Send>, InstrumentError> {
    let spb = serialport::new(port, 9600).timeout(timeout);
    Ok(Box::new(crate::SerialInterface::full(spb)?))
}

#[cfg(not(feature = "serial"))]
fn open_serial(
    _port: &str,
    _timeout: Duration,
) -> Result<Box<dyn InstrumentInterface + Send>, InstrumentError> {
    Err(InstrumentError::InterfaceNotAvailable("serial"))
}

/// Parse the board number after the interface keyword, empty meaning board 0.
fn parse_board(board: &str) -> Option<u16> {
    if board.is_empty() {
        Some(0)
    } else {
        board.parse().ok()
    }
}

/// Parse a vendor or product id, either decimal or hexadecimal with `0x` prefix.
fn parse_id(id: &str) -> Option<u16> {
    let id = id.trim();
    match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => id.parse().ok(),
    }
}

/// Map the port of an `ASRL` resource to a serial port name.
///
/// Numbered ports follow the VISA convention: `ASRL1` is `COM1` on Windows and `/dev/ttyS0`
/// elsewhere. Anything else is taken as the name of the port.
fn serial_port_name(port: &str) -> String {
    match port.parse::<u16>() {
        Ok(num) if cfg!(windows) => format!("COM{num}"),
        Ok(num) => format!("/dev/ttyS{}", num.saturating_sub(1)),
        Err(_) => port.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0x0957"), Some(0x0957));
        assert_eq!(parse_id("0X17bc"), Some(0x17BC));
        assert_eq!(parse_id("4883"), Some(4883));
        assert_eq!(parse_id("0xZZ"), None);
    }

    #[test]
    fn test_parse_board() {
        assert_eq!(parse_board(""), Some(0));
        assert_eq!(parse_board("2"), Some(2));
        assert_eq!(parse_board("x"), None);
    }

    #[test]
    fn test_serial_port_name() {
        assert_eq!(serial_port_name("/dev/ttyUSB0"), "/dev/ttyUSB0");
        if cfg!(windows) {
            assert_eq!(serial_port_name("3"), "COM3");
        } else {
            assert_eq!(serial_port_name("1"), "/dev/ttyS0");
        }
    }
}
