//! In-memory stand-in for the FT232H and EVE controller used by unit tests.
//!
//! Decodes the MPSSE stream written by [`MpsseSpi`](crate::mpsse::MpsseSpi),
//! groups clocked bytes into chip-select frames and applies each frame to a
//! sparse model of the controller's address space. The coprocessor consumes
//! the ring instantly unless stalled.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::eve::registers::{RAM_CMD, RAM_CMD_SIZE, REG_CMD_READ, REG_CMD_WRITE, REG_ID};
use crate::mpsse::{opcode, CS_PIN, PD_PIN};
use crate::usb::UsbTransport;
use crate::{Error, Result};

#[derive(Default)]
struct Frame {
    mosi: Vec<u8>,
    duplex: bool,
}

#[derive(Default)]
pub struct MockState {
    pub open: bool,
    pub fail_open: bool,
    /// Vendor control requests as (request, value, index).
    pub control: Vec<(u8, u16, u16)>,
    /// Every buffer passed to `write_raw`.
    pub writes: Vec<Vec<u8>>,
    /// MOSI bytes of each completed chip-select frame.
    pub transactions: Vec<Vec<u8>>,
    pub host_commands: Vec<u8>,
    /// Memory writes as (address, payload) in arrival order.
    pub reg_writes: Vec<(u32, Vec<u8>)>,
    /// Words written into the coprocessor ring.
    pub cmd_words: Vec<u32>,
    pub divisor: Option<u16>,
    pub gpio_high: u8,
    /// When set, publishing the write pointer does not advance the read pointer.
    pub coprocessor_stalled: bool,
    /// Caps how many bytes a single read returns.
    pub max_read: Option<usize>,
    memory: HashMap<u32, u8>,
    pending: VecDeque<u8>,
    frame: Option<Frame>,
}

impl MockState {
    pub fn poke(&mut self, addr: u32, bytes: &[u8]) {
        for (offset, byte) in bytes.iter().enumerate() {
            self.memory.insert(addr + offset as u32, *byte);
        }
    }

    pub fn peek(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|offset| self.memory.get(&(addr + offset)).copied().unwrap_or(0))
            .collect()
    }

    pub fn peek_u8(&self, addr: u32) -> u8 {
        self.peek(addr, 1)[0]
    }

    pub fn peek_u16(&self, addr: u32) -> u16 {
        let b = self.peek(addr, 2);
        u16::from_le_bytes([b[0], b[1]])
    }

    pub fn peek_u32(&self, addr: u32) -> u32 {
        let b = self.peek(addr, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn cmd_write(&self) -> u16 {
        self.peek_u16(REG_CMD_WRITE)
    }

    pub fn pd_high(&self) -> bool {
        self.gpio_high & PD_PIN != 0
    }

    /// Index of the first write of `value` to `addr`, if any.
    pub fn write_index(&self, addr: u32, value: &[u8]) -> Option<usize> {
        self.reg_writes
            .iter()
            .position(|(a, v)| *a == addr && v == value)
    }

    fn feed(&mut self, data: &[u8]) {
        let mut i = 0;
        while i < data.len() {
            match data[i] {
                opcode::SET_BITS_LOW => {
                    let selected = data[i + 1] & CS_PIN == 0;
                    if selected {
                        self.frame.get_or_insert_with(Frame::default);
                    } else if let Some(frame) = self.frame.take() {
                        self.finish(frame);
                    }
                    i += 3;
                }
                opcode::SET_BITS_HIGH => {
                    self.gpio_high = data[i + 1];
                    i += 3;
                }
                opcode::TCK_DIVISOR => {
                    self.divisor = Some(u16::from_le_bytes([data[i + 1], data[i + 2]]));
                    i += 3;
                }
                opcode::DISABLE_DIV_5
                | opcode::DISABLE_ADAPTIVE
                | opcode::DISABLE_3_PHASE
                | opcode::LOOPBACK_OFF
                | opcode::SEND_IMMEDIATE => i += 1,
                op @ (opcode::WRITE_BYTES_NVE_MSB | opcode::RW_BYTES_PVE_NVE_MSB) => {
                    let len = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize + 1;
                    let payload = &data[i + 3..i + 3 + len];
                    let frame = self
                        .frame
                        .as_mut()
                        .expect("data clocked with chip select released");
                    frame.mosi.extend_from_slice(payload);
                    frame.duplex |= op == opcode::RW_BYTES_PVE_NVE_MSB;
                    i += 3 + len;
                }
                other => panic!("unexpected MPSSE opcode {other:#04X}"),
            }
        }
    }

    fn finish(&mut self, frame: Frame) {
        let mosi = frame.mosi;
        self.transactions.push(mosi.clone());
        let addr = || ((mosi[0] as u32 & 0x3F) << 16) | (mosi[1] as u32) << 8 | mosi[2] as u32;

        if frame.duplex {
            assert!(mosi.len() >= 4, "read without address and dummy byte");
            let base = addr();
            let miso: Vec<u8> = (0..mosi.len() - 4)
                .map(|offset| self.peek_u8(base + offset as u32))
                .collect();
            self.pending.extend([0u8; 4]);
            self.pending.extend(miso);
        } else if mosi.len() == 3 {
            self.host_commands.push(mosi[0]);
        } else if mosi[0] & 0xC0 == 0x80 {
            let base = addr();
            self.store(base, mosi[3..].to_vec());
        } else {
            panic!("malformed transaction {mosi:02X?}");
        }
    }

    fn store(&mut self, addr: u32, payload: Vec<u8>) {
        self.poke(addr, &payload);
        if (RAM_CMD..RAM_CMD + RAM_CMD_SIZE as u32).contains(&addr) && payload.len() == 4 {
            self.cmd_words
                .push(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]));
        }
        if addr == REG_CMD_WRITE && !self.coprocessor_stalled {
            let write = self.peek(REG_CMD_WRITE, 2);
            self.poke(REG_CMD_READ, &write);
        }
        self.reg_writes.push((addr, payload));
    }
}

/// Cloneable handle; clones share one emulated device.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.poke(REG_ID, &[0x7C]);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl UsbTransport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.fail_open {
            return Err(Error::DeviceNotFound {
                vendor_id: crate::FTDI_VID,
                product_id: crate::FT232H_PID,
            });
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn control_out(&mut self, request: u8, value: u16, index: u16) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::DeviceUnavailable);
        }
        state.control.push((request, value, index));
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::DeviceUnavailable);
        }
        state.writes.push(data.to_vec());
        state.feed(data);
        Ok(())
    }

    fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::DeviceUnavailable);
        }
        let n = len
            .min(state.max_read.unwrap_or(usize::MAX))
            .min(state.pending.len());
        Ok(state.pending.drain(..n).collect())
    }

    fn close(&mut self) {
        self.state().open = false;
    }
}
