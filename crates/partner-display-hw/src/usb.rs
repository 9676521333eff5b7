//! USB transport for the FT232H bridge.
//!
//! [`UsbTransport`] is the narrow capability the MPSSE engine needs: open the
//! bridge, push raw bytes to the bulk OUT endpoint, pull payload bytes from the
//! bulk IN endpoint and send vendor control requests. [`NusbTransport`] is the
//! nusb implementation used on real hardware.

use std::time::{Duration, Instant};

use futures::stream::BoxStream;
use futures::StreamExt;
use nusb::descriptors::TransferType;
use nusb::hotplug::HotplugEvent;
use nusb::transfer::{Buffer, Bulk, ControlOut, ControlType, In, Out, Recipient, TransferError};
use nusb::{Endpoint, MaybeFuture};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Bulk IN endpoint used when the descriptors do not name one.
pub const DEFAULT_IN_ENDPOINT: u8 = 0x81;

/// Bulk OUT endpoint used when the descriptors do not name one.
pub const DEFAULT_OUT_ENDPOINT: u8 = 0x02;

/// High-speed bulk packet size, each packet carries two status bytes.
const DEFAULT_PACKET_SIZE: usize = 512;

/// Size of each bulk IN request.
const READ_CHUNK_SIZE: usize = 512;

/// Largest single bulk OUT transfer.
const WRITE_CHUNK_SIZE: usize = 16 * 1024;

/// Timeout for one bulk IN request before polling again.
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Overall deadline for collecting a full read.
const READ_DEADLINE: Duration = Duration::from_millis(5000);

/// Timeout for bulk OUT and control transfers.
const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Raw byte transport to the MPSSE engine.
pub trait UsbTransport {
    /// Opens the device and claims its interface.
    fn open(&mut self) -> Result<()>;

    /// Returns true while a claimed handle is held.
    fn is_open(&self) -> bool;

    /// Sends a vendor OUT control request with no data stage.
    fn control_out(&mut self, request: u8, value: u16, index: u16) -> Result<()>;

    /// Writes all bytes to the bulk OUT endpoint.
    fn write_raw(&mut self, data: &[u8]) -> Result<()>;

    /// Reads up to `len` payload bytes.
    ///
    /// Returns early with whatever was collected if the read deadline
    /// passes; callers decide whether a short result is an error.
    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Releases the interface and device handle. Safe to call repeatedly.
    fn close(&mut self);
}

/// Claimed device plus the endpoints opened on it.
struct Handle {
    _device: nusb::Device,
    interface: nusb::Interface,
    bulk_in: Endpoint<Bulk, In>,
    bulk_out: Endpoint<Bulk, Out>,
    packet_size: usize,
}

/// Endpoint addresses chosen for the claimed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoints {
    bulk_in: u8,
    bulk_out: u8,
    packet_size: usize,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            bulk_in: DEFAULT_IN_ENDPOINT,
            bulk_out: DEFAULT_OUT_ENDPOINT,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

/// nusb-backed transport for an FTDI bridge.
pub struct NusbTransport {
    vendor_id: u16,
    product_id: u16,
    interface_number: u8,
    handle: Option<Handle>,
}

impl NusbTransport {
    /// Creates a closed transport for the given VID:PID on interface 0.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            interface_number: 0,
            handle: None,
        }
    }

    fn handle(&mut self) -> Result<&mut Handle> {
        self.handle.as_mut().ok_or(Error::DeviceUnavailable)
    }
}

impl UsbTransport for NusbTransport {
    fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let device_info = nusb::list_devices()
            .wait()?
            .find(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id)
            .ok_or(Error::DeviceNotFound {
                vendor_id: self.vendor_id,
                product_id: self.product_id,
            })?;

        let device = device_info.open().wait()?;
        let interface = device
            .detach_and_claim_interface(self.interface_number)
            .wait()
            .map_err(|source| Error::ClaimFailed {
                interface: self.interface_number,
                source,
            })?;

        let endpoints = discover_endpoints(&device, self.interface_number);
        debug!(
            "Bulk endpoints: IN {:#04X}, OUT {:#04X}, packet size {}",
            endpoints.bulk_in, endpoints.bulk_out, endpoints.packet_size
        );

        let bulk_in = interface.endpoint::<Bulk, In>(endpoints.bulk_in)?;
        let bulk_out = interface.endpoint::<Bulk, Out>(endpoints.bulk_out)?;

        info!(
            "Partner display bridge opened (VID:{:04X} PID:{:04X}, interface={})",
            self.vendor_id, self.product_id, self.interface_number
        );

        self.handle = Some(Handle {
            _device: device,
            interface,
            bulk_in,
            bulk_out,
            packet_size: endpoints.packet_size,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn control_out(&mut self, request: u8, value: u16, index: u16) -> Result<()> {
        let handle = self.handle()?;
        handle
            .interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    data: &[],
                },
                WRITE_TIMEOUT,
            )
            .wait()?;
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.handle()?;
        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            let mut buffer = Buffer::new(chunk.len());
            buffer.extend_from_slice(chunk);
            let completion = handle.bulk_out.transfer_blocking(buffer, WRITE_TIMEOUT);
            completion.status?;
            if completion.actual_len != chunk.len() {
                return Err(Error::ShortWrite {
                    expected: chunk.len(),
                    actual: completion.actual_len,
                });
            }
        }
        Ok(())
    }

    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let deadline = Instant::now() + READ_DEADLINE;
        let mut payload = Vec::with_capacity(len);

        while payload.len() < len && Instant::now() < deadline {
            let completion = handle
                .bulk_in
                .transfer_blocking(Buffer::new(READ_CHUNK_SIZE), READ_POLL_TIMEOUT);
            match completion.status {
                Ok(()) => {}
                // Timed-out requests come back cancelled; poll again.
                Err(TransferError::Cancelled) => continue,
                Err(e) => return Err(e.into()),
            }
            let raw = completion.buffer.into_vec();
            strip_status_bytes(&raw[..completion.actual_len], handle.packet_size, &mut payload);
        }

        if payload.len() < len {
            warn!("USB read timed out with {}/{} bytes", payload.len(), len);
        }
        payload.truncate(len);
        Ok(payload)
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            info!("Partner display bridge closed");
        }
    }
}

/// Picks the bulk endpoints of `interface_number` from the active configuration.
fn discover_endpoints(device: &nusb::Device, interface_number: u8) -> Endpoints {
    let mut found = Endpoints::default();
    let config = match device.active_configuration() {
        Ok(config) => config,
        Err(e) => {
            debug!("No active configuration ({}), using default endpoints", e);
            return found;
        }
    };

    for group in config.interfaces() {
        if group.interface_number() != interface_number {
            continue;
        }
        for alt in group.alt_settings() {
            for ep in alt.endpoints() {
                if ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                if ep.address() & 0x80 != 0 {
                    found.bulk_in = ep.address();
                    found.packet_size = ep.max_packet_size();
                } else {
                    found.bulk_out = ep.address();
                }
            }
        }
    }
    found
}

/// Appends the payload of each packet in `raw`, dropping the two FTDI
/// modem-status bytes that lead every packet.
fn strip_status_bytes(raw: &[u8], packet_size: usize, out: &mut Vec<u8>) {
    let packet_size = packet_size.max(3);
    for packet in raw.chunks(packet_size) {
        if packet.len() > 2 {
            out.extend_from_slice(&packet[2..]);
        }
    }
}

/// Checks whether a device with the given VID:PID is attached.
///
/// Only enumerates the bus; the device is never opened.
pub fn is_device_connected(vendor_id: u16, product_id: u16) -> bool {
    match nusb::list_devices().wait() {
        Ok(mut devices) => devices.any(|d| d.vendor_id() == vendor_id && d.product_id() == product_id),
        Err(e) => {
            debug!("USB enumeration failed: {}", e);
            false
        }
    }
}

/// Streams a unit event whenever a matching device arrives or any device leaves.
///
/// Fails when the platform has no hotplug support; callers fall back to polling.
pub fn watch_hotplug(vendor_id: u16, product_id: u16) -> Result<BoxStream<'static, ()>> {
    let watch = nusb::watch_devices()?;
    let events = watch.filter_map(move |event| {
        let relevant = match &event {
            HotplugEvent::Connected(info) => {
                info.vendor_id() == vendor_id && info.product_id() == product_id
            }
            HotplugEvent::Disconnected(_) => true,
        };
        futures::future::ready(relevant.then_some(()))
    });
    Ok(events.boxed())
}
