//! Dedicated hardware thread.
//!
//! Every USB and SPI call is blocking, so the display driver lives on its
//! own OS thread and is reached only through [`HardwareHandle`]. Requests
//! are served one at a time, which keeps a single hardware session alive at
//! any moment.

use anyhow::{anyhow, Context, Result};
use futures::stream::BoxStream;
use partner_display_hw::usb::{self, NusbTransport, UsbTransport};
use partner_display_hw::{MirrorRequest, PartnerDisplay};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;

/// Operations the manager needs from one driver session.
pub trait DisplayDriver {
    fn open(&mut self) -> partner_display_hw::Result<()>;
    fn init(&mut self) -> partner_display_hw::Result<()>;
    fn mirror(&mut self, request: &MirrorRequest) -> partner_display_hw::Result<()>;
    fn shutdown(&mut self) -> partner_display_hw::Result<()>;
    fn close(&mut self);
}

impl<T: UsbTransport> DisplayDriver for PartnerDisplay<T> {
    fn open(&mut self) -> partner_display_hw::Result<()> {
        PartnerDisplay::open(self)
    }

    fn init(&mut self) -> partner_display_hw::Result<()> {
        PartnerDisplay::init(self)
    }

    fn mirror(&mut self, request: &MirrorRequest) -> partner_display_hw::Result<()> {
        PartnerDisplay::mirror(self, request)
    }

    fn shutdown(&mut self) -> partner_display_hw::Result<()> {
        PartnerDisplay::shutdown(self)
    }

    fn close(&mut self) {
        PartnerDisplay::close(self)
    }
}

/// Source of drivers and device presence.
pub trait DisplayBackend: Send + 'static {
    /// Checks for the device without opening it.
    fn is_device_connected(&self) -> bool;

    /// Builds a fresh, closed driver for one session.
    fn create_driver(&self) -> Box<dyn DisplayDriver>;

    /// Stream of hotplug wake-ups, or `None` to rely on polling alone.
    fn watch_hotplug(&self) -> Option<BoxStream<'static, ()>> {
        None
    }
}

/// The FT232H on the local USB bus.
pub struct UsbBackend {
    vendor_id: u16,
    product_id: u16,
    spi_hz: u32,
    hotplug: bool,
}

impl UsbBackend {
    pub fn new(device: &DeviceConfig, hotplug: bool) -> Self {
        Self {
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            spi_hz: device.spi_hz,
            hotplug,
        }
    }
}

impl DisplayBackend for UsbBackend {
    fn is_device_connected(&self) -> bool {
        usb::is_device_connected(self.vendor_id, self.product_id)
    }

    fn create_driver(&self) -> Box<dyn DisplayDriver> {
        let transport = NusbTransport::new(self.vendor_id, self.product_id);
        Box::new(PartnerDisplay::with_transport(transport, self.spi_hz))
    }

    fn watch_hotplug(&self) -> Option<BoxStream<'static, ()>> {
        if !self.hotplug {
            return None;
        }
        match usb::watch_hotplug(self.vendor_id, self.product_id) {
            Ok(events) => {
                debug!("USB hotplug events enabled");
                Some(events)
            }
            Err(e) => {
                warn!("USB hotplug unavailable ({}), polling only", e);
                None
            }
        }
    }
}

enum Request {
    Probe {
        reply: oneshot::Sender<bool>,
    },
    Open {
        reply: oneshot::Sender<partner_display_hw::Result<()>>,
    },
    Mirror {
        request: MirrorRequest,
        reply: oneshot::Sender<partner_display_hw::Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Async front end of the hardware thread. Cheap to clone.
#[derive(Clone)]
pub struct HardwareHandle {
    tx: mpsc::Sender<Request>,
}

impl HardwareHandle {
    /// Starts the hardware thread. It exits once every handle is dropped,
    /// tearing down any open session first.
    pub fn spawn(backend: Box<dyn DisplayBackend>) -> Result<(Self, thread::JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel(16);
        let join = thread::Builder::new()
            .name("partner-hw".into())
            .spawn(move || Worker::new(backend).run(rx))
            .context("Failed to spawn hardware thread")?;
        Ok((Self { tx }, join))
    }

    async fn call<T>(&self, request: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(request(reply))
            .await
            .map_err(|_| anyhow!("hardware thread has exited"))?;
        rx.await.map_err(|_| anyhow!("hardware thread dropped the request"))
    }

    /// Whether the device is on the bus.
    pub async fn probe(&self) -> Result<bool> {
        self.call(|reply| Request::Probe { reply }).await
    }

    /// Opens and initializes a new driver session, replacing any old one.
    pub async fn open(&self) -> Result<()> {
        self.call(|reply| Request::Open { reply }).await??;
        Ok(())
    }

    /// Draws text on the open session.
    pub async fn mirror(&self, request: MirrorRequest) -> Result<()> {
        self.call(|reply| Request::Mirror { request, reply }).await??;
        Ok(())
    }

    /// Shuts down and closes the open session, if any.
    pub async fn close(&self) -> Result<()> {
        self.call(|reply| Request::Close { reply }).await
    }
}

struct Worker {
    backend: Box<dyn DisplayBackend>,
    driver: Option<Box<dyn DisplayDriver>>,
}

impl Worker {
    fn new(backend: Box<dyn DisplayBackend>) -> Self {
        Self {
            backend,
            driver: None,
        }
    }

    fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        debug!("Hardware thread started");
        while let Some(request) = rx.blocking_recv() {
            match request {
                Request::Probe { reply } => {
                    let _ = reply.send(self.backend.is_device_connected());
                }
                Request::Open { reply } => {
                    let _ = reply.send(self.open());
                }
                Request::Mirror { request, reply } => {
                    let result = match self.driver.as_mut() {
                        Some(driver) => driver.mirror(&request),
                        None => Err(partner_display_hw::Error::DeviceUnavailable),
                    };
                    let _ = reply.send(result);
                }
                Request::Close { reply } => {
                    self.teardown();
                    let _ = reply.send(());
                }
            }
        }
        self.teardown();
        debug!("Hardware thread exiting");
    }

    fn open(&mut self) -> partner_display_hw::Result<()> {
        self.teardown();
        let mut driver = self.backend.create_driver();
        if let Err(e) = driver.open() {
            driver.close();
            return Err(e);
        }
        if let Err(e) = driver.init() {
            if let Err(e) = driver.shutdown() {
                warn!("Error powering down after failed init: {}", e);
            }
            driver.close();
            return Err(e);
        }
        self.driver = Some(driver);
        Ok(())
    }

    /// Best effort: a failed shutdown never skips the close.
    fn teardown(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(e) = driver.shutdown() {
                warn!("Error shutting down display: {}", e);
            }
            driver.close();
            info!("Partner display released");
        }
    }
}
