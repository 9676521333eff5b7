//! Partner Display Hardware Library
//!
//! Drives the outward-facing partner display: an FTDI FT232H bridge put into
//! MPSSE mode as an SPI master, talking to an EVE-class graphics controller
//! behind a 480x128 panel.

pub mod bitmap;
pub mod display;
pub mod error;
pub mod eve;
pub mod mpsse;
pub mod panel;
pub mod usb;

#[cfg(test)]
mod mock;

pub use display::{DriverState, MirrorRequest, PartnerDisplay, MAX_TEXT_BYTES};
pub use error::{Error, Result};
pub use panel::{PanelTiming, Rgb};
pub use usb::{is_device_connected, NusbTransport, UsbTransport};

/// Panel dimensions
pub const DISPLAY_WIDTH: u16 = 480;
pub const DISPLAY_HEIGHT: u16 = 128;

/// USB VID:PID for the FT232H bridge
pub const FTDI_VID: u16 = 0x0403;
pub const FT232H_PID: u16 = 0x6014;

/// SPI clock used when talking to the graphics controller.
pub const DEFAULT_SPI_HZ: u32 = 15_000_000;
