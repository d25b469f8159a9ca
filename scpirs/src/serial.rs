//! This module provides the implementation for an instrument controlled via a serial port.
//!
//! It includes a blocking implementation of the `InstrumentInterface` trait using the
//! `serialport` crate. Serial resources are addressed as `ASRL<port>::INSTR`.

use std::time::Duration;

use log::info;
use serialport::{SerialPort, SerialPortBuilder};

use crate::{Instrument, InstrumentError};

/// A blocking serial port implementation using the `serialport` crate.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Try to create a new serial instrument interface with a simple configuration.
    ///
    /// The port is opened with 8 data bits, no parity, one stop bit, and a timeout of three
    /// seconds. The terminator is by default set to `"\n"`.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(port: &str, baud: u32) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(3));
        Self::full(spb)
    }

    /// Try to create a new serial instrument interface from a fully configured builder.
    ///
    /// # Arguments
    /// * `spb` - A `SerialPortBuilder` to configure the serial port. See
    ///   [`serialport::SerialPortBuilder`] and the [`serialport::new`] function for more details.
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        info!("Opened serial port {:?}", port.name());
        Ok(Instrument::new(port, timeout))
    }
}
