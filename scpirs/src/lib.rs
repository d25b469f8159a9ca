//! scpiRs: Talk to your SCPI test and measurement equipment from Rust
//!
//! The scpiRs library provides blocking transports to talk SCPI to bench instruments such as
//! oscilloscopes. To do so, it provides an [`InstrumentInterface`] trait and its implementations.
//! Furthermore, we also provide an [`InstrumentError`] error type that instrument drivers should
//! return.
//!
//! # Currently implemented interfaces are:
//! - TCP/IP (blocking) raw SCPI sockets using [`std::net::TcpStream`].
//! - USBTMC (blocking) using the [`rusb`] crate (feature `usb`, enabled by default).
//! - Serial (blocking) using the [`serialport`] crate (feature `serial`).
//!
//! Instruments are usually addressed with VISA-style resource strings, e.g.,
//! `USB0::0x0957::0x17BC::MY56310625::INSTR` or `TCPIP0::192.168.1.100::INSTR`. The
//! [`open_resource`] function parses such an address and opens the matching interface.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use scpirs::{InstrumentInterface, open_resource};
//!
//! let mut inst = open_resource("TCPIP0::192.168.1.100::INSTR", Duration::from_secs(3)).unwrap();
//! println!("Connected to: {}", inst.query("*IDN?").unwrap());
//! ```
//!
//! # Testing drivers
//!
//! Drivers should be tested without hardware using the [`LoopbackInterfaceString`] for plain
//! SCPI conversations and the [`LoopbackInterfaceBytes`] if binary blocks are involved.
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod instrument;
mod loopback;
mod resource;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;
#[cfg(feature = "usb")]
mod usbtmc;

pub use instrument::{Instrument, InstrumentError};
pub use loopback::{LoopbackInterfaceBytes, LoopbackInterfaceString};
pub use resource::{ResourceAddress, SCPI_RAW_PORT, UsbAddress, UsbResource, open_resource};
#[cfg(feature = "serial")]
pub use serial::SerialInterface;
pub use tcp_ip::TcpIpInterface;
#[cfg(feature = "usb")]
pub use usbtmc::{UsbTmcInterface, UsbTmcPort, list_usb_resources};

use std::time::{Duration, Instant};

use log::{debug, warn};

/// The `InstrumentInterface` trait defines the interface for talking to instruments.
///
/// Only the raw reading and writing of bytes must be implemented by an interface. Sending
/// commands, querying, reading until a terminator, and reading IEEE 488.2 binary blocks are
/// provided on top of these primitives.
pub trait InstrumentInterface {
    /// Read exactly `buf.len()` bytes from the instrument.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Write all bytes in `data` to the instrument and flush the interface.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Get the terminator of the interface. Defaults to `"\n"`.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of an interface from a `&str`.
    ///
    /// # Arguments:
    /// - `_terminator` - A string slice that will be used as the terminator for commands
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the timeout of the interface. Defaults to three seconds.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Write a string slice to the instrument as is, i.e., without appending a terminator.
    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        self.write_raw(data.as_bytes())
    }

    /// Send a command to the instrument.
    ///
    /// This function takes the command, appends the terminator, and writes it to the instrument.
    ///
    /// # Arguments:
    /// - `cmd` - A string slice that will be sent to the instrument.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        debug!("Sending command: {cmd}");
        let cmd = format!("{cmd}{}", self.get_terminator());
        self.write(&cmd)
    }

    /// Read from the instrument until the terminator is found and return the trimmed response.
    ///
    /// If no terminator is encountered before the timeout of the interface is over, a
    /// [`InstrumentError::Timeout`] is returned. Bytes that are not valid UTF-8 are skipped with
    /// a warning.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let timeout = self.get_timeout();
        let terminator = self.get_terminator().to_string();
        let mut response = String::new();
        let mut single_buf = [0u8];

        let tic = Instant::now();
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            match std::str::from_utf8(&single_buf) {
                Ok(val) => response.push_str(val),
                Err(_) => warn!("Received invalid UTF-8 data: {single_buf:?}"),
            }
            if response.ends_with(&terminator) {
                return Ok(response.trim().to_string());
            }
        }
        Err(InstrumentError::Timeout(timeout))
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// The command is sent with `sendcmd`, then the response is read until the terminator. A
    /// timeout is reported together with the query that caused it.
    ///
    /// # Arguments
    /// * `cmd` - The command to send to the instrument for which we expect a response.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_until_terminator().map_err(|err| match err {
            InstrumentError::Timeout(timeout) => InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            },
            err => err,
        })
    }

    /// Read an IEEE 488.2 definite length arbitrary block, e.g., `#800012345<data>`.
    ///
    /// The header is `#`, followed by one digit `n` and then `n` digits giving the length of the
    /// payload. The terminator that follows the payload is consumed as well. Only the payload is
    /// returned, also if the terminator does not arrive before the timeout.
    fn read_block(&mut self) -> Result<Vec<u8>, InstrumentError> {
        let mut byte = [0u8];
        self.read_exact(&mut byte)?;
        if byte[0] != b'#' {
            return Err(InstrumentError::ResponseParseError(format!(
                "Binary block must start with '#', got {:?}",
                char::from(byte[0])
            )));
        }

        self.read_exact(&mut byte)?;
        let num_digits = match char::from(byte[0]).to_digit(10) {
            Some(0) => {
                return Err(InstrumentError::ResponseParseError(
                    "Indefinite length blocks (#0) are not supported".to_string(),
                ));
            }
            Some(n) => n as usize,
            None => {
                return Err(InstrumentError::ResponseParseError(format!(
                    "Invalid block header length digit {:?}",
                    char::from(byte[0])
                )));
            }
        };

        let mut len_buf = vec![0u8; num_digits];
        self.read_exact(&mut len_buf)?;
        let len_str = String::from_utf8_lossy(&len_buf).to_string();
        let len = len_str
            .parse::<usize>()
            .map_err(|_| InstrumentError::ResponseParseError(format!("#{num_digits}{len_str}")))?;
        debug!("Reading binary block of {len} bytes");

        let mut payload = vec![0u8; len];
        self.read_exact(&mut payload)?;

        let mut trailing = vec![0u8; self.get_terminator().len()];
        match self.read_exact(&mut trailing) {
            Ok(()) => Ok(payload),
            Err(err) if err.is_timeout() => {
                warn!("No terminator after binary block of {len} bytes");
                Ok(payload)
            }
            Err(err) => Err(err),
        }
    }
}

impl<T: InstrumentInterface + ?Sized> InstrumentInterface for Box<T> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        (**self).read_exact(buf)
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        (**self).write_raw(data)
    }

    fn get_terminator(&self) -> &str {
        (**self).get_terminator()
    }

    fn set_terminator(&mut self, terminator: &str) {
        (**self).set_terminator(terminator)
    }

    fn get_timeout(&self) -> Duration {
        (**self).get_timeout()
    }

    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        (**self).write(data)
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        (**self).sendcmd(cmd)
    }

    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        (**self).read_until_terminator()
    }

    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        (**self).query(cmd)
    }

    fn read_block(&mut self) -> Result<Vec<u8>, InstrumentError> {
        (**self).read_block()
    }
}
