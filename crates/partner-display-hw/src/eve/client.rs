//! Register, display-list and coprocessor access over SPI.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::registers::{
    HostCommand, CMD_INFLATE, DLSWAP_FRAME, RAM_CMD, RAM_CMD_SIZE, RAM_DL, RAM_DL_SIZE,
    REG_CMD_READ, REG_CMD_WRITE, REG_DLSWAP,
};
use crate::mpsse::MpsseSpi;
use crate::usb::UsbTransport;
use crate::{Error, Result};

/// Default timeout for `cmd_wait`.
pub const CMD_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for waiting on ring space.
pub const CMD_SPACE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for the final wait of an inflate upload.
pub const INFLATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Compressed bytes streamed to the ring per inflate step.
const INFLATE_CHUNK: usize = 2048;

const CMD_WAIT_POLL: Duration = Duration::from_millis(10);
const CMD_SPACE_POLL: Duration = Duration::from_millis(5);

/// Write header: top bits `10`, then the 22-bit address big-endian.
pub fn write_header(addr: u32) -> [u8; 3] {
    [0x80 | ((addr >> 16) as u8 & 0x3F), (addr >> 8) as u8, addr as u8]
}

/// Read header: top bits `00`, the address, then one dummy byte.
pub fn read_header(addr: u32) -> [u8; 4] {
    [(addr >> 16) as u8 & 0x3F, (addr >> 8) as u8, addr as u8, 0x00]
}

/// Free bytes in the command ring for the given read and write pointers.
///
/// One word is always held back so a full ring never looks empty.
pub fn ring_free_space(read: u16, write: u16) -> usize {
    let size = RAM_CMD_SIZE as usize;
    let read = read as usize % size;
    let write = write as usize % size;
    (read + 2 * size - write - 4) % size
}

/// Client for the controller's address space and coprocessor ring.
pub struct EveClient<T> {
    spi: MpsseSpi<T>,
    /// Next free byte in RAM_DL.
    dl_offset: u32,
    /// Host-side copy of the ring write pointer.
    cmd_write: u16,
}

impl<T: UsbTransport> EveClient<T> {
    pub fn new(spi: MpsseSpi<T>) -> Self {
        Self {
            spi,
            dl_offset: 0,
            cmd_write: 0,
        }
    }

    pub fn spi(&self) -> &MpsseSpi<T> {
        &self.spi
    }

    pub fn spi_mut(&mut self) -> &mut MpsseSpi<T> {
        &mut self.spi
    }

    /// Sends a 3-byte host command frame.
    pub fn host_cmd(&mut self, cmd: HostCommand) -> Result<()> {
        debug!("Host command {:?}", cmd);
        self.spi.spi_write(&[cmd as u8, 0x00, 0x00])
    }

    fn write(&mut self, addr: u32, value: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(3 + value.len());
        buf.extend_from_slice(&write_header(addr));
        buf.extend_from_slice(value);
        self.spi.spi_write(&buf)
    }

    fn read<const N: usize>(&mut self, addr: u32) -> Result<[u8; N]> {
        let data = self.spi.spi_read(&read_header(addr), N)?;
        let mut value = [0u8; N];
        value.copy_from_slice(&data[..N]);
        Ok(value)
    }

    pub fn wr8(&mut self, addr: u32, value: u8) -> Result<()> {
        self.write(addr, &[value])
    }

    pub fn wr16(&mut self, addr: u32, value: u16) -> Result<()> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn wr32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.write(addr, &value.to_le_bytes())
    }

    /// Writes a contiguous block starting at `addr` in one transaction.
    pub fn wr_bulk(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.write(addr, data)
    }

    pub fn rd8(&mut self, addr: u32) -> Result<u8> {
        Ok(self.read::<1>(addr)?[0])
    }

    pub fn rd16(&mut self, addr: u32) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read(addr)?))
    }

    pub fn rd32(&mut self, addr: u32) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read(addr)?))
    }

    // Display list

    /// Starts a new display list at the beginning of RAM_DL.
    pub fn dl_start(&mut self) {
        self.dl_offset = 0;
    }

    /// Appends one display-list word.
    ///
    /// # Panics
    ///
    /// Panics if the list would run past the end of RAM_DL.
    pub fn dl_word(&mut self, word: u32) -> Result<()> {
        assert!(
            self.dl_offset < RAM_DL_SIZE,
            "display list overflow at offset {}",
            self.dl_offset
        );
        self.wr32(RAM_DL + self.dl_offset, word)?;
        self.dl_offset += 4;
        Ok(())
    }

    /// Presents the display list on the next frame.
    pub fn dl_swap(&mut self) -> Result<()> {
        self.wr8(REG_DLSWAP, DLSWAP_FRAME)
    }

    pub fn dl_offset(&self) -> u32 {
        self.dl_offset
    }

    // Coprocessor ring

    /// Loads the hardware write pointer into the host cursor.
    pub fn cmd_begin(&mut self) -> Result<()> {
        self.cmd_write = self.rd16(REG_CMD_WRITE)? % RAM_CMD_SIZE;
        Ok(())
    }

    /// Writes one word at the cursor and advances it around the ring.
    pub fn cmd_word(&mut self, word: u32) -> Result<()> {
        self.wr32(RAM_CMD + self.cmd_write as u32, word)?;
        self.cmd_write = (self.cmd_write + 4) % RAM_CMD_SIZE;
        Ok(())
    }

    /// Publishes the cursor so the coprocessor starts executing.
    pub fn cmd_end(&mut self) -> Result<()> {
        self.wr16(REG_CMD_WRITE, self.cmd_write)
    }

    /// Host cursor into the ring.
    pub fn cmd_cursor(&self) -> u16 {
        self.cmd_write
    }

    /// Polls until the coprocessor has consumed everything published.
    pub fn cmd_wait(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let read = self.rd16(REG_CMD_READ)?;
            let write = self.rd16(REG_CMD_WRITE)?;
            if read == write {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::CoprocessorTimeout { read, write });
            }
            thread::sleep(CMD_WAIT_POLL);
        }
    }

    /// Polls until at least `needed` bytes are free in the ring.
    pub fn wait_cmd_space(&mut self, needed: usize, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let read = self.rd16(REG_CMD_READ)?;
            let write = self.rd16(REG_CMD_WRITE)?;
            let available = ring_free_space(read, write);
            if available >= needed {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::CommandBufferFull { needed, available });
            }
            thread::sleep(CMD_SPACE_POLL);
        }
    }

    /// Emits `text` NUL-terminated and zero-padded to a word boundary.
    pub fn cmd_string(&mut self, text: &str) -> Result<()> {
        for word in string_words(text) {
            self.cmd_word(word)?;
        }
        Ok(())
    }

    /// Streams zlib data through `CMD_INFLATE` into RAM_G at `dest`.
    ///
    /// The payload can exceed the ring, so it goes out in chunks: wait for
    /// space, write, publish, then resynchronise the cursor from hardware.
    pub fn cmd_inflate(&mut self, dest: u32, compressed: &[u8]) -> Result<()> {
        let mut padded = compressed.to_vec();
        padded.resize(compressed.len().next_multiple_of(4), 0x00);

        self.cmd_begin()?;
        self.cmd_word(CMD_INFLATE)?;
        self.cmd_word(dest)?;

        for chunk in padded.chunks(INFLATE_CHUNK) {
            // The command words above are not yet published on the first pass
            self.wait_cmd_space(chunk.len() + 8, CMD_SPACE_TIMEOUT)?;
            for word in chunk.chunks_exact(4) {
                self.cmd_word(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))?;
            }
            self.cmd_end()?;
            thread::sleep(Duration::from_millis(1));
            self.cmd_write = self.rd16(REG_CMD_WRITE)? % RAM_CMD_SIZE;
        }

        self.cmd_end()?;
        debug!(
            "Inflated {} compressed bytes to {:#08X}",
            compressed.len(),
            dest
        );
        self.cmd_wait(INFLATE_TIMEOUT)
    }
}

/// Little-endian words of `text` plus a NUL, zero-padded to 4 bytes.
fn string_words(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0x00);
    bytes.resize(bytes.len().next_multiple_of(4), 0x00);
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}
