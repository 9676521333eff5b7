//! Error types for the partner display hardware library.

use thiserror::Error;

use crate::display::DriverState;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the partner display.
#[derive(Error, Debug)]
pub enum Error {
    /// No USB device with the requested VID:PID is attached.
    #[error("partner display not found (VID:PID {vendor_id:04X}:{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The USB handle is not open (never opened, or already closed).
    #[error("USB device unavailable")]
    DeviceUnavailable,

    /// The interface could not be claimed, usually because another driver holds it.
    #[error("unable to claim USB interface {interface}: {source}")]
    ClaimFailed {
        interface: u8,
        #[source]
        source: nusb::Error,
    },

    /// Error from the nusb USB layer.
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    /// A bulk or control transfer did not complete successfully.
    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    /// A bulk write completed without sending every byte.
    #[error("short write: sent {actual} of {expected} bytes")]
    ShortWrite { expected: usize, actual: usize },

    /// The bridge returned fewer bytes than the SPI transaction clocked in.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// The graphics controller never reported the expected chip ID.
    #[error("graphics controller not responding (REG_ID 0x{found:02X}, expected 0x{expected:02X})")]
    ChipId { found: u8, expected: u8 },

    /// The coprocessor did not drain its command ring in time.
    #[error("coprocessor timeout (read pointer {read:#05X}, write pointer {write:#05X})")]
    CoprocessorTimeout { read: u16, write: u16 },

    /// The command ring never freed enough space for the pending payload.
    #[error("command buffer full: needed {needed} bytes, {available} available")]
    CommandBufferFull { needed: usize, available: usize },

    /// Operation issued in the wrong driver state.
    #[error("cannot {operation} while driver is {state}")]
    InvalidState {
        operation: &'static str,
        state: DriverState,
    },

    /// Invalid argument(s) were provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Image loading or decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
