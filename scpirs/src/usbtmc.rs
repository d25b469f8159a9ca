//! This module provides the implementation for an instrument controlled via USBTMC.
//!
//! USBTMC (USB Test and Measurement Class) instruments expose an interface with class `0xFE` and
//! subclass `3`, and talk through a bulk-out and a bulk-in endpoint. Every transfer starts with
//! a 12 byte header that carries the message id and a rolling tag. The [`UsbTmcPort`] wraps this
//! framing into [`std::io::Read`] and [`std::io::Write`], such that it can be used with the
//! generic [`Instrument`].

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    time::Duration,
};

use log::{debug, info, warn};
use rusb::{Device, DeviceDescriptor, DeviceHandle, Direction, GlobalContext, TransferType};

use crate::{Instrument, InstrumentError, UsbAddress, UsbResource};

const USBTMC_INTERFACE_CLASS: u8 = 0xfe;
const USBTMC_INTERFACE_SUBCLASS: u8 = 3;

const MSG_DEV_DEP_MSG_OUT: u8 = 1;
const MSG_REQUEST_DEV_DEP_MSG_IN: u8 = 2;
const MSG_DEV_DEP_MSG_IN: u8 = 2;

const HEADER_SIZE: usize = 12;
const MAX_TRANSFER_SIZE: usize = 64 * 1024;
const READ_BUFFER_SIZE: usize = HEADER_SIZE + MAX_TRANSFER_SIZE + 512;

/// Location of the USBTMC interface and its bulk endpoints on a device.
#[derive(Debug, Clone, Copy)]
struct TmcEndpoints {
    config: u8,
    interface: u8,
    bulk_in: u8,
    bulk_out: u8,
}

/// A blocking USBTMC implementation using the `rusb` crate.
#[derive(Debug)]
pub struct UsbTmcInterface {}

impl UsbTmcInterface {
    /// Try to open the USBTMC instrument with the given address.
    ///
    /// The device is looked up by vendor id, product id, and serial number. If a kernel driver
    /// is bound to the USBTMC interface, it is detached for the lifetime of the session and
    /// reattached when the interface is dropped.
    ///
    /// # Arguments
    /// * `address` - The USB address of the instrument.
    /// * `timeout` - Timeout for every USB transfer.
    pub fn open(
        address: &UsbAddress,
        timeout: Duration,
    ) -> Result<Instrument<UsbTmcPort>, InstrumentError> {
        let devices = rusb::devices()?;
        let candidates = devices.iter().filter_map(|device| {
            let desc = device.device_descriptor().ok()?;
            if desc.vendor_id() != address.vendor_id || desc.product_id() != address.product_id {
                return None;
            }
            let endpoints = find_usbtmc_interface(&device, &desc, address.interface)?;
            Some((device, desc, endpoints))
        });

        let Some(((_, _, endpoints), handle)) = open_matching_serial(
            candidates,
            &address.serial,
            |(device, _, _)| device.open(),
            |(_, desc, _), handle| {
                handle
                    .read_serial_number_string_ascii(desc)
                    .unwrap_or_default()
            },
        ) else {
            return Err(InstrumentError::DeviceNotFound(address.to_string()));
        };

        let port = UsbTmcPort::claim(handle, endpoints, timeout)?;
        info!("Connected via USBTMC to {address}");
        Ok(Instrument::new(port, timeout))
    }
}

/// Open the candidates in order and return the first one with the wanted serial number.
///
/// Candidates that cannot be opened, e.g., because another user holds them, are skipped with a
/// warning.
fn open_matching_serial<C, H>(
    candidates: impl IntoIterator<Item = C>,
    wanted: &str,
    mut open: impl FnMut(&C) -> rusb::Result<H>,
    serial: impl Fn(&C, &H) -> String,
) -> Option<(C, H)> {
    for candidate in candidates {
        let handle = match open(&candidate) {
            Ok(handle) => handle,
            Err(err) => {
                warn!("Could not open USBTMC device while looking for serial {wanted}: {err}");
                continue;
            }
        };
        let found = serial(&candidate, &handle);
        if found == wanted {
            return Some((candidate, handle));
        }
        debug!("Skipping device with serial {found}");
    }
    None
}

/// List all USBTMC instruments that are currently connected.
///
/// Devices that cannot be opened, e.g., because of missing permissions, are skipped with a
/// warning. The order is the enumeration order of the USB stack and is not guaranteed to be
/// stable.
pub fn list_usb_resources() -> Result<Vec<UsbResource>, InstrumentError> {
    let mut resources = Vec::new();
    for device in rusb::devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(err) => {
                warn!("Could not read device descriptor: {err}");
                continue;
            }
        };
        let Some(endpoints) = find_usbtmc_interface(&device, &desc, None) else {
            continue;
        };
        let handle = match device.open() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(
                    "Could not open USBTMC device {:04x}:{:04x}: {err}",
                    desc.vendor_id(),
                    desc.product_id()
                );
                continue;
            }
        };
        let serial = handle
            .read_serial_number_string_ascii(&desc)
            .unwrap_or_default();
        let address = UsbAddress {
            board: 0,
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            serial: serial.clone(),
            interface: (endpoints.interface != 0).then_some(endpoints.interface),
        };
        debug!("Found USBTMC device {address}");
        resources.push(UsbResource {
            address: address.to_string(),
            manufacturer: handle.read_manufacturer_string_ascii(&desc).ok(),
            product: handle.read_product_string_ascii(&desc).ok(),
            serial,
        });
    }
    Ok(resources)
}

/// Find the first USBTMC interface of a device that has a bulk-in and a bulk-out endpoint.
fn find_usbtmc_interface(
    device: &Device<GlobalContext>,
    desc: &DeviceDescriptor,
    interface: Option<u8>,
) -> Option<TmcEndpoints> {
    for config in (0..desc.num_configurations()).filter_map(|n| device.config_descriptor(n).ok()) {
        for iface_desc in config.interfaces().flat_map(|iface| iface.descriptors()) {
            if iface_desc.class_code() != USBTMC_INTERFACE_CLASS
                || iface_desc.sub_class_code() != USBTMC_INTERFACE_SUBCLASS
            {
                continue;
            }
            if interface.is_some_and(|num| num != iface_desc.interface_number()) {
                continue;
            }

            let mut bulk_in = None;
            let mut bulk_out = None;
            for ep_desc in iface_desc.endpoint_descriptors() {
                if ep_desc.transfer_type() != TransferType::Bulk {
                    continue;
                }
                match ep_desc.direction() {
                    Direction::In => bulk_in = Some(ep_desc.address()),
                    Direction::Out => bulk_out = Some(ep_desc.address()),
                }
            }
            if let (Some(bulk_in), Some(bulk_out)) = (bulk_in, bulk_out) {
                return Some(TmcEndpoints {
                    config: config.number(),
                    interface: iface_desc.interface_number(),
                    bulk_in,
                    bulk_out,
                });
            }
        }
    }
    None
}

/// Build the 12 byte bulk header of a USBTMC transfer.
fn bulk_header(msg_id: u8, btag: u8, transfer_size: u32, attributes: u8) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = msg_id;
    header[1] = btag;
    header[2] = !btag;
    header[4..8].copy_from_slice(&transfer_size.to_le_bytes());
    header[8] = attributes;
    header
}

/// The operations of a USB device handle that are needed to claim an interface.
trait InterfaceHandle {
    fn kernel_driver_active(&self, iface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()>;
    fn attach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()>;
    fn active_configuration(&self) -> rusb::Result<u8>;
    fn set_active_configuration(&mut self, config: u8) -> rusb::Result<()>;
    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()>;
}

impl InterfaceHandle for DeviceHandle<GlobalContext> {
    fn kernel_driver_active(&self, iface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, iface)
    }

    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, iface)
    }

    fn attach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::attach_kernel_driver(self, iface)
    }

    fn active_configuration(&self) -> rusb::Result<u8> {
        DeviceHandle::active_configuration(self)
    }

    fn set_active_configuration(&mut self, config: u8) -> rusb::Result<()> {
        DeviceHandle::set_active_configuration(self, config)
    }

    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, iface)
    }
}

/// Detach a bound kernel driver, select the configuration, and claim the USBTMC interface.
///
/// Returns whether a kernel driver was detached and must be reattached on release. If the claim
/// fails after detaching, the kernel driver is reattached before the error is returned.
fn claim_tmc_interface<H: InterfaceHandle>(
    handle: &mut H,
    endpoints: &TmcEndpoints,
) -> Result<bool, InstrumentError> {
    // Not supported on all platforms, in which case there is no driver to detach.
    let detached = match handle.kernel_driver_active(endpoints.interface) {
        Ok(true) => {
            handle.detach_kernel_driver(endpoints.interface)?;
            true
        }
        _ => false,
    };

    let claimed = configure_and_claim(handle, endpoints);
    if let Err(err) = claimed {
        if detached {
            if let Err(attach_err) = handle.attach_kernel_driver(endpoints.interface) {
                warn!("Failed to reattach kernel driver: {attach_err}");
            }
        }
        return Err(err.into());
    }
    Ok(detached)
}

fn configure_and_claim<H: InterfaceHandle>(
    handle: &mut H,
    endpoints: &TmcEndpoints,
) -> rusb::Result<()> {
    if handle.active_configuration().ok() != Some(endpoints.config) {
        handle.set_active_configuration(endpoints.config)?;
    }
    handle.claim_interface(endpoints.interface)
}

/// A claimed USBTMC interface that implements [`std::io::Read`] and [`std::io::Write`].
///
/// Every call to `write` is sent as one device dependent message, the last transfer carrying the
/// end-of-message flag. Reads request a new transfer from the device whenever the received data
/// is used up. The interface is released when the port is dropped.
pub struct UsbTmcPort {
    handle: DeviceHandle<GlobalContext>,
    endpoints: TmcEndpoints,
    reattach_kernel_driver: bool,
    timeout: Duration,
    btag: u8,
    rx: VecDeque<u8>,
}

impl UsbTmcPort {
    /// Claim the USBTMC interface of an opened device.
    fn claim(
        mut handle: DeviceHandle<GlobalContext>,
        endpoints: TmcEndpoints,
        timeout: Duration,
    ) -> Result<Self, InstrumentError> {
        let reattach_kernel_driver = claim_tmc_interface(&mut handle, &endpoints)?;

        for ep in [endpoints.bulk_out, endpoints.bulk_in] {
            if let Err(err) = handle.clear_halt(ep) {
                debug!("Could not clear halt on endpoint {ep:#04x}: {err}");
            }
        }

        Ok(UsbTmcPort {
            handle,
            endpoints,
            reattach_kernel_driver,
            timeout,
            btag: 0,
            rx: VecDeque::new(),
        })
    }

    /// Get the next bTag, which runs from 1 to 255.
    fn next_btag(&mut self) -> u8 {
        self.btag = if self.btag == u8::MAX { 1 } else { self.btag + 1 };
        self.btag
    }

    /// Send one DEV_DEP_MSG_OUT transfer.
    fn send_transfer(&mut self, data: &[u8], end_of_message: bool) -> Result<(), InstrumentError> {
        let btag = self.next_btag();
        let header = bulk_header(
            MSG_DEV_DEP_MSG_OUT,
            btag,
            data.len() as u32,
            u8::from(end_of_message),
        );
        let padding = (4 - data.len() % 4) % 4;
        let mut packet = Vec::with_capacity(HEADER_SIZE + data.len() + padding);
        packet.extend_from_slice(&header);
        packet.extend_from_slice(data);
        packet.resize(HEADER_SIZE + data.len() + padding, 0);
        self.handle
            .write_bulk(self.endpoints.bulk_out, &packet, self.timeout)?;
        Ok(())
    }

    /// Request one DEV_DEP_MSG_IN transfer and append its payload to the receive buffer.
    fn receive_transfer(&mut self) -> Result<(), InstrumentError> {
        let btag = self.next_btag();
        let request = bulk_header(
            MSG_REQUEST_DEV_DEP_MSG_IN,
            btag,
            MAX_TRANSFER_SIZE as u32,
            0,
        );
        self.handle
            .write_bulk(self.endpoints.bulk_out, &request, self.timeout)?;

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let received = self
            .handle
            .read_bulk(self.endpoints.bulk_in, &mut buf, self.timeout)?;
        if received < HEADER_SIZE || buf[0] != MSG_DEV_DEP_MSG_IN || buf[1] != btag {
            return Err(InstrumentError::ResponseParseError(format!(
                "Invalid USBTMC bulk-in header: {:?}",
                &buf[..received.min(HEADER_SIZE)]
            )));
        }
        let transfer_size =
            u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;

        let mut payload = buf[HEADER_SIZE..received].to_vec();
        while payload.len() < transfer_size {
            let received = self
                .handle
                .read_bulk(self.endpoints.bulk_in, &mut buf, self.timeout)?;
            if received == 0 {
                break;
            }
            payload.extend_from_slice(&buf[..received]);
        }
        payload.truncate(transfer_size);
        debug!("Received USBTMC transfer of {} bytes", payload.len());
        self.rx.extend(payload);
        Ok(())
    }
}

/// Translate errors such that timeouts stay recognizable through [`std::io::Read`].
fn to_io_error(err: InstrumentError) -> io::Error {
    match err {
        InstrumentError::Usb(rusb::Error::Timeout) => {
            io::Error::new(io::ErrorKind::TimedOut, "USBTMC transfer timed out")
        }
        InstrumentError::Io(err) => err,
        err => io::Error::other(err),
    }
}

impl Read for UsbTmcPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.rx.is_empty() {
            self.receive_transfer().map_err(to_io_error)?;
        }
        let num = buf.len().min(self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..num)) {
            *dst = src;
        }
        Ok(num)
    }
}

impl Write for UsbTmcPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let chunk = &buf[..buf.len().min(MAX_TRANSFER_SIZE)];
        let end_of_message = chunk.len() == buf.len();
        self.send_transfer(chunk, end_of_message)
            .map_err(to_io_error)?;
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UsbTmcPort {
    fn drop(&mut self) {
        if let Err(err) = self.handle.release_interface(self.endpoints.interface) {
            warn!("Failed to release USBTMC interface: {err}");
        }
        if self.reattach_kernel_driver {
            if let Err(err) = self.handle.attach_kernel_driver(self.endpoints.interface) {
                warn!("Failed to reattach kernel driver: {err}");
            }
        }
    }
}
