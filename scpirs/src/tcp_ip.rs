//! This module provides the implementation for an instrument controlled via TCP/IP.
//!
//! It includes a blocking implementation of the `InstrumentInterface` trait using the
//! [`std::net::TcpStream`] struct. Instruments are expected to expose a raw SCPI socket, which
//! most oscilloscopes do on port 5025.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, info};

use crate::{Instrument, InstrumentError};

/// A blocking TCP/IP implementation using the [`std::net::TcpStream`] struct.
#[derive(Debug)]
pub struct TcpIpInterface {}

impl TcpIpInterface {
    /// Try to create a new TCP/IP instrument interface with a timeout of three seconds.
    ///
    /// The terminator is by default set to `"\n"`, but can be changed using the `set_terminator`
    /// function. Note that the terminator is automatically appended to commands and reading
    /// responses will read until the terminator is found.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.1.100:5025"`.
    pub fn simple<A: ToSocketAddrs>(
        sock_addr: A,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        Self::timeout(sock_addr, Duration::from_secs(3))
    }

    /// Try to create a new TCP/IP instrument interface with a given timeout.
    ///
    /// The timeout is used for connecting, reading, and writing. We never allow the stream to
    /// block forever, as a hanging instrument would otherwise hang the whole program.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.1.100:5025"`.
    /// * `timeout` - Timeout for connecting, reading, and writing.
    pub fn timeout<A: ToSocketAddrs>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        let stream = connect(sock_addr, timeout)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Connected via TCP/IP to {}", stream.peer_addr()?);
        Ok(Instrument::new(stream, timeout))
    }
}

/// Connect to the first socket address that accepts a connection within the timeout.
fn connect<A: ToSocketAddrs>(sock_addr: A, timeout: Duration) -> Result<TcpStream, InstrumentError> {
    let mut last_err = None;
    for addr in sock_addr.to_socket_addrs()? {
        debug!("Trying to connect to {addr}");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(match last_err {
        Some(err) => InstrumentError::Io(err),
        None => InstrumentError::InvalidResource("no socket address to connect to".to_string()),
    })
}
