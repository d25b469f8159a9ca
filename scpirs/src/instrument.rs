//! This module provides the main implementation for the Instrument Interface trait.
//!
//! It can be called with any type that implements [`std::io::Read`] and [`std::io::Write`],
//! such as [`std::net::TcpStream`], a serial port, or the [`crate::UsbTmcPort`].

use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use thiserror::Error;

use crate::InstrumentInterface;

/// A general instrument interface that can be built with any interface that implements
/// [`std::io::Read`] and [`std::io::Write`].
///
/// This struct is what all the transports in this crate hand out. However, this general
/// implementation can also be used with any other stream that is not provided by `scpiRs`.
///
/// # Example
///
/// The following shows how to create an [`Instrument`] from your own stream. Of course, to just
/// use a simple [`std::net::TcpStream`] as shown here, you can also use the
/// [`crate::TcpIpInterface`] interface.
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use scpirs::Instrument;
///
/// let my_stream = TcpStream::connect("192.168.10.1:5025").unwrap();
/// let inst_interface = Instrument::new(my_stream, Duration::from_secs(3));
/// ```
pub struct Instrument<P: Read + Write> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: Read + Write> Instrument<P> {
    /// Create a new instance of [`Instrument`] with a given stream and timeout.
    ///
    /// The timeout is only used to bound reads until a terminator. Timeouts of the stream itself
    /// must be configured on the stream.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }
}

impl<P: Read + Write> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf).map_err(|err| match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => InstrumentError::Timeout(self.timeout),
            _ => InstrumentError::Io(err),
        })
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }
}

/// The error enum for all transports and instruments.
///
/// For any command sending or querying, your instrument should return either an empty result or a
/// result with the query where this Error is the alternative. [`InstrumentError`] makes it easy to
/// propagate all the sending commands, querying errors forward with the `?` operator such that
/// errors propagate nicely.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// No device matching the resource address is connected. Contains the resource address.
    #[error("Could not find a device for resource '{0}'")]
    DeviceNotFound(String),
    /// The interface required for a resource address was not compiled in. Contains the name of
    /// the cargo feature that must be enabled.
    #[error("Interface not available, enable the `{0}` feature to use it")]
    InterfaceNotAvailable(&'static str),
    /// The resource address could not be parsed. Contains the offending address.
    #[error("Invalid resource address: '{0}'")]
    InvalidResource(String),
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Instrument response could not be parsed because it was unexpected by the driver. This error
    /// contains the response (or a description of it) that was received from the instrument.
    #[error("Response from instrument could not be parsed. Response was: {0}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// Timeout occurred while waiting for a response from the instrument. The error contains the
    /// timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query. The error contains the query
    /// that was sent and the timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response to query: {query}. Timeout was set to {timeout:?}."
    )]
    TimeoutQuery {
        /// The query that timed out.
        query: String,
        /// The timeout that was set.
        timeout: Duration,
    },
    #[cfg(feature = "usb")]
    /// Errors of the USB stack, e.g., access to the device was denied. See [`rusb::Error`] for
    /// more information.
    #[error(transparent)]
    Usb(#[from] rusb::Error),
}

impl InstrumentError {
    /// The instrument did not answer in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            InstrumentError::Timeout(_) | InstrumentError::TimeoutQuery { .. } => true,
            InstrumentError::Io(err) => err.kind() == std::io::ErrorKind::TimedOut,
            #[cfg(feature = "usb")]
            InstrumentError::Usb(err) => *err == rusb::Error::Timeout,
            _ => false,
        }
    }

    /// The operating system denied access to the device.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            InstrumentError::Io(err) => err.kind() == std::io::ErrorKind::PermissionDenied,
            #[cfg(feature = "usb")]
            InstrumentError::Usb(err) => *err == rusb::Error::Access,
            _ => false,
        }
    }

    /// No device answers at the resource address.
    pub fn is_not_found(&self) -> bool {
        match self {
            InstrumentError::DeviceNotFound(_) => true,
            InstrumentError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::HostUnreachable
            ),
            #[cfg(feature = "usb")]
            InstrumentError::Usb(err) => matches!(err, rusb::Error::NoDevice | rusb::Error::NotFound),
            _ => false,
        }
    }
}
