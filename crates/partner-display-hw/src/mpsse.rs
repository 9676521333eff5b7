//! MPSSE SPI master on top of a raw USB transport.
//!
//! Pin mapping on the FT232H:
//! - ADBUS0 SCK, ADBUS1 MOSI, ADBUS2 MISO (input), ADBUS3 CS#
//! - ACBUS6 PD# of the graphics controller
//!
//! Every transaction is queued as one USB write so chip select, clocking and
//! the trailing deassert reach the engine back to back.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::usb::UsbTransport;
use crate::{Error, Result};

/// FTDI vendor control requests.
pub const SIO_RESET_REQUEST: u8 = 0x00;
pub const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;
pub const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;

/// Value for SIO_RESET_REQUEST that resets the SIO engine.
pub const SIO_RESET_SIO: u16 = 0;

/// Bitmode selecting the MPSSE engine.
pub const BITMODE_MPSSE: u8 = 0x02;

/// wIndex addressing interface A of the bridge.
pub const INTERFACE_A_INDEX: u16 = 1;

/// MPSSE opcodes.
pub mod opcode {
    /// Set ADBUS levels and directions: `[0x80, value, direction]`.
    pub const SET_BITS_LOW: u8 = 0x80;
    /// Set ACBUS levels and directions: `[0x82, value, direction]`.
    pub const SET_BITS_HIGH: u8 = 0x82;
    /// Clock divisor: `[0x86, low, high]`.
    pub const TCK_DIVISOR: u8 = 0x86;
    pub const DISABLE_DIV_5: u8 = 0x8A;
    pub const DISABLE_ADAPTIVE: u8 = 0x97;
    pub const DISABLE_3_PHASE: u8 = 0x8D;
    pub const LOOPBACK_OFF: u8 = 0x85;
    /// Flush the read buffer back to the host now.
    pub const SEND_IMMEDIATE: u8 = 0x87;
    /// Clock bytes out on the falling edge, MSB first.
    pub const WRITE_BYTES_NVE_MSB: u8 = 0x11;
    /// Clock bytes out on the falling edge and in on the rising edge, MSB first.
    pub const RW_BYTES_PVE_NVE_MSB: u8 = 0x31;
}

/// Chip select on ADBUS3, active low.
pub const CS_PIN: u8 = 0x08;

/// Every ADBUS pin is an output except MISO.
pub const ADBUS_DIRECTION: u8 = 0xFB;

/// PD# on ACBUS6, driven high to keep the controller powered.
pub const PD_PIN: u8 = 0x40;

/// ACBUS direction: only PD# is driven.
pub const ACBUS_DIRECTION: u8 = PD_PIN;

/// MPSSE base clock with divide-by-5 disabled.
const BASE_CLOCK_HZ: u32 = 60_000_000;

/// Largest payload one clocking command carries (16-bit length, sent as len-1).
const MAX_MPSSE_TRANSFER: usize = 65536;

/// Settle time after the engine has been configured.
const CONFIGURE_SETTLE: Duration = Duration::from_millis(50);

/// Computes the TCK divisor for `hz`: `hz = 60 MHz / ((1 + divisor) * 2)`.
///
/// Rounds toward the slower clock, never above the requested rate.
pub fn clock_divisor(hz: u32) -> Result<u16> {
    if hz == 0 || hz > BASE_CLOCK_HZ / 2 {
        return Err(Error::InvalidArgument("SPI clock must be between 1 Hz and 30 MHz"));
    }
    let divisor = BASE_CLOCK_HZ.div_ceil(2 * hz).saturating_sub(1);
    Ok(divisor.min(u16::MAX as u32) as u16)
}

/// SCK frequency produced by `divisor`.
pub fn divisor_clock_hz(divisor: u16) -> u32 {
    BASE_CLOCK_HZ / ((1 + divisor as u32) * 2)
}

/// wValue for SIO_SET_BITMODE_REQUEST: pin mask in the low byte, mode in the high byte.
pub fn bitmode_value(mask: u8, mode: u8) -> u16 {
    mask as u16 | (mode as u16) << 8
}

/// Appends `opcode` clocking commands covering `data`, split at the MPSSE length limit.
fn push_clocked(buf: &mut Vec<u8>, opcode: u8, data: &[u8]) {
    for chunk in data.chunks(MAX_MPSSE_TRANSFER) {
        let len = (chunk.len() - 1) as u16;
        buf.push(opcode);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(chunk);
    }
}

/// SPI master driven through the MPSSE engine.
pub struct MpsseSpi<T> {
    transport: T,
    requested_hz: u32,
    clock_hz: u32,
    /// Cached ADBUS and ACBUS levels; the hardware is never read back.
    gpio_low: u8,
    gpio_high: u8,
}

impl<T: UsbTransport> MpsseSpi<T> {
    /// Wraps a transport; nothing is sent until [`open`](Self::open).
    pub fn new(transport: T, clock_hz: u32) -> Self {
        Self {
            transport,
            requested_hz: clock_hz,
            clock_hz,
            gpio_low: CS_PIN,
            gpio_high: PD_PIN,
        }
    }

    /// Opens the transport and puts the bridge into MPSSE mode.
    ///
    /// The transport is closed again if configuration fails.
    pub fn open(&mut self) -> Result<()> {
        self.transport.open()?;
        if let Err(e) = self.configure() {
            self.transport.close();
            return Err(e);
        }
        Ok(())
    }

    /// Sends the bring-up sequence. Control requests must precede the data
    /// channel commands, which the engine only understands once in MPSSE mode.
    pub fn configure(&mut self) -> Result<()> {
        let divisor = clock_divisor(self.requested_hz)?;

        self.transport
            .control_out(SIO_RESET_REQUEST, SIO_RESET_SIO, INTERFACE_A_INDEX)?;
        self.transport
            .control_out(SIO_SET_LATENCY_TIMER_REQUEST, 1, INTERFACE_A_INDEX)?;
        self.transport.control_out(
            SIO_SET_BITMODE_REQUEST,
            bitmode_value(ADBUS_DIRECTION, BITMODE_MPSSE),
            INTERFACE_A_INDEX,
        )?;

        self.gpio_low = CS_PIN;
        self.gpio_high = PD_PIN;
        let [div_low, div_high] = divisor.to_le_bytes();
        self.transport.write_raw(&[
            opcode::DISABLE_DIV_5,
            opcode::DISABLE_ADAPTIVE,
            opcode::DISABLE_3_PHASE,
            opcode::TCK_DIVISOR,
            div_low,
            div_high,
            opcode::LOOPBACK_OFF,
            opcode::SET_BITS_LOW,
            self.gpio_low,
            ADBUS_DIRECTION,
            opcode::SET_BITS_HIGH,
            self.gpio_high,
            ACBUS_DIRECTION,
        ])?;
        thread::sleep(CONFIGURE_SETTLE);

        self.clock_hz = divisor_clock_hz(divisor);
        debug!(
            "MPSSE configured: SPI {} Hz (requested {} Hz, divisor {})",
            self.clock_hz, self.requested_hz, divisor
        );
        Ok(())
    }

    /// Returns the SPI clock in Hz. Exact once [`open`](Self::open) has
    /// programmed the divisor, the requested rate before that.
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Returns true while the transport holds an open handle.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Releases the transport.
    pub fn close(&mut self) {
        self.transport.close();
    }

    fn cs_assert(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[
            opcode::SET_BITS_LOW,
            self.gpio_low & !CS_PIN,
            ADBUS_DIRECTION,
        ]);
    }

    fn cs_release(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[
            opcode::SET_BITS_LOW,
            self.gpio_low | CS_PIN,
            ADBUS_DIRECTION,
        ]);
    }

    /// Clocks `data` out inside one chip-select frame.
    pub fn spi_write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(data.len() + 9 + 3 * (data.len() / MAX_MPSSE_TRANSFER));
        self.cs_assert(&mut buf);
        push_clocked(&mut buf, opcode::WRITE_BYTES_NVE_MSB, data);
        self.cs_release(&mut buf);
        self.transport.write_raw(&buf)
    }

    /// Clocks `write` followed by `read_len` zero bytes full-duplex and
    /// returns the bytes received after the `write` phase.
    ///
    /// One continuous clocking command covers both phases; separate write and
    /// read commands shift the received bits.
    pub fn spi_read(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        let total = write.len() + read_len;
        if total == 0 {
            return Ok(Vec::new());
        }
        let mut mosi = Vec::with_capacity(total);
        mosi.extend_from_slice(write);
        mosi.resize(total, 0x00);

        let mut buf = Vec::with_capacity(total + 10);
        self.cs_assert(&mut buf);
        push_clocked(&mut buf, opcode::RW_BYTES_PVE_NVE_MSB, &mosi);
        buf.push(opcode::SEND_IMMEDIATE);
        self.cs_release(&mut buf);
        self.transport.write_raw(&buf)?;

        let mut miso = self.transport.read_raw(total)?;
        if miso.len() < total {
            return Err(Error::ShortRead {
                expected: total,
                actual: miso.len(),
            });
        }
        Ok(miso.split_off(write.len()))
    }

    /// Drives the ACBUS pins selected by `mask` to `level`.
    pub fn set_gpio_high(&mut self, mask: u8, level: bool) -> Result<()> {
        if level {
            self.gpio_high |= mask;
        } else {
            self.gpio_high &= !mask;
        }
        self.transport
            .write_raw(&[opcode::SET_BITS_HIGH, self.gpio_high, ACBUS_DIRECTION])
    }

    /// Drives PD# low, powering the graphics controller down.
    pub fn power_down(&mut self) -> Result<()> {
        self.set_gpio_high(PD_PIN, false)
    }
}
