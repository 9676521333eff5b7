//! High-level partner display driver.
//!
//! [`PartnerDisplay`] owns the USB handle for its whole lifetime and walks a
//! small state machine:
//!
//! ```text
//! Closed --open()--> Opened --init()--> Active
//!   ^                  ^                  |
//!   |                  +----shutdown()----+
//!   +-------------------close()-----------+
//! ```
//!
//! Every drawing operation builds a complete coprocessor sequence
//! (DLSTART ... DISPLAY, SWAP) and waits for the coprocessor to finish.

use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bitmap::{compress_zlib, image_to_rgb565, load_panel_image, looks_like_zlib};
use crate::eve::client::{CMD_SPACE_TIMEOUT, CMD_WAIT_TIMEOUT};
use crate::eve::dl;
use crate::eve::registers::*;
use crate::eve::EveClient;
use crate::mpsse::MpsseSpi;
use crate::panel::{PanelTiming, Rgb};
use crate::usb::{self, NusbTransport, UsbTransport};
use crate::{Error, Result, DEFAULT_SPI_HZ, FT232H_PID, FTDI_VID};

/// Default ROM font for mirrored text.
pub const DEFAULT_FONT: i16 = 31;

const WAKE_DELAY: Duration = Duration::from_millis(300);
const CHIP_ID_ATTEMPTS: u32 = 10;
const CHIP_ID_RETRY: Duration = Duration::from_millis(50);
const COPROCESSOR_RESET_DELAY: Duration = Duration::from_millis(20);
const SHUTDOWN_CLEAR_DELAY: Duration = Duration::from_millis(50);

/// Usable bytes of the command ring; one word always stays free.
const RING_CAPACITY: usize = RAM_CMD_SIZE as usize - 4;

/// Words every scene adds around its body: DLSTART, clear color, clear,
/// color, DISPLAY and SWAP.
const SCENE_OVERHEAD_WORDS: usize = 6;

/// Longest text, in UTF-8 bytes, that [`PartnerDisplay::display_text`]
/// accepts. The string, its NUL and padding share the ring with three
/// CMD_TEXT words.
pub const MAX_TEXT_BYTES: usize = RING_CAPACITY - (SCENE_OVERHEAD_WORDS + 3) * 4 - 1;

/// Lifecycle state of a [`PartnerDisplay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No USB handle held.
    Closed,
    /// Bridge claimed and in MPSSE mode; controller not brought up.
    Opened,
    /// Controller running, drawing operations allowed.
    Active,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Closed => write!(f, "closed"),
            DriverState::Opened => write!(f, "opened"),
            DriverState::Active => write!(f, "active"),
        }
    }
}

/// Text to mirror, with optional placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub text: String,
    /// Anchor position; centered on screen when both are `None`.
    pub x: Option<i16>,
    pub y: Option<i16>,
    pub font: i16,
    pub color: Rgb,
}

impl MirrorRequest {
    /// Text centered on the panel.
    pub fn centered(text: impl Into<String>, font: i16, color: Rgb) -> Self {
        Self {
            text: text.into(),
            x: None,
            y: None,
            font,
            color,
        }
    }
}

impl Default for MirrorRequest {
    fn default() -> Self {
        Self::centered(" ", DEFAULT_FONT, Rgb::WHITE)
    }
}

/// Driver for the partner display.
pub struct PartnerDisplay<T = NusbTransport> {
    eve: EveClient<T>,
    timing: PanelTiming,
    state: DriverState,
}

impl PartnerDisplay<NusbTransport> {
    /// Driver for the stock FT232H at the default SPI clock.
    pub fn new() -> Self {
        Self::with_transport(NusbTransport::new(FTDI_VID, FT232H_PID), DEFAULT_SPI_HZ)
    }

    /// Checks for the stock FT232H without opening it.
    pub fn is_device_connected() -> bool {
        usb::is_device_connected(FTDI_VID, FT232H_PID)
    }
}

impl Default for PartnerDisplay<NusbTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UsbTransport> PartnerDisplay<T> {
    /// Wraps a closed transport. Nothing touches the bus until [`open`](Self::open).
    pub fn with_transport(transport: T, spi_hz: u32) -> Self {
        Self {
            eve: EveClient::new(MpsseSpi::new(transport, spi_hz)),
            timing: PanelTiming::default(),
            state: DriverState::Closed,
        }
    }

    /// Overrides the panel timing programmed by [`init`](Self::init).
    pub fn with_timing(mut self, timing: PanelTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn timing(&self) -> &PanelTiming {
        &self.timing
    }

    fn require(&self, expected: DriverState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Claims the bridge and configures MPSSE. Stays `Closed` on failure.
    pub fn open(&mut self) -> Result<()> {
        self.require(DriverState::Closed, "open")?;
        self.eve.spi_mut().open()?;
        self.state = DriverState::Opened;
        info!(
            "Partner display opened (SPI {:.1} MHz)",
            self.eve.spi().clock_hz() as f64 / 1e6
        );
        Ok(())
    }

    /// Brings the controller up and lights the panel.
    ///
    /// Fails with [`Error::ChipId`] if the controller never identifies
    /// itself; the driver then stays `Opened` and should be closed.
    pub fn init(&mut self) -> Result<()> {
        self.require(DriverState::Opened, "init")?;
        info!("Initializing partner display");

        self.eve.host_cmd(HostCommand::ClockExternal)?;
        self.eve.host_cmd(HostCommand::Active)?;
        thread::sleep(WAKE_DELAY);

        self.wait_for_chip_id()?;
        self.reset_coprocessor()?;
        self.program_timing()?;

        // Blank frame before the pixel clock starts
        self.eve.dl_start();
        self.eve.dl_word(dl::clear_color_rgb(0, 0, 0))?;
        self.eve.dl_word(dl::clear(true, true, true))?;
        self.eve.dl_word(dl::display())?;
        self.eve.dl_swap()?;

        let gpio_dir = self.eve.rd8(REG_GPIO_DIR)?;
        self.eve.wr8(REG_GPIO_DIR, gpio_dir | GPIO_BACKLIGHT)?;
        self.eve.wr8(REG_PCLK, self.timing.pclk_div)?;
        let gpio = self.eve.rd8(REG_GPIO)?;
        self.eve.wr8(REG_GPIO, gpio | GPIO_BACKLIGHT)?;
        debug!("Pixel clock started, backlight on");

        self.eve.cmd_begin()?;
        self.eve.cmd_word(CMD_SETROTATE)?;
        self.eve.cmd_word(self.timing.rotate as u32)?;
        self.eve.cmd_end()?;
        self.eve.cmd_wait(CMD_WAIT_TIMEOUT)?;

        let frequency = self.eve.rd32(REG_FREQUENCY)?;
        info!(
            "Partner display ready: {}x{}, system clock {:.1} MHz",
            self.timing.width,
            self.timing.height,
            frequency as f64 / 1e6
        );
        self.state = DriverState::Active;
        Ok(())
    }

    fn wait_for_chip_id(&mut self) -> Result<()> {
        let mut found = 0;
        for attempt in 1..=CHIP_ID_ATTEMPTS {
            found = self.eve.rd8(REG_ID)?;
            if found == CHIP_ID {
                debug!("REG_ID = 0x{:02X} after {} attempt(s)", found, attempt);
                return Ok(());
            }
            thread::sleep(CHIP_ID_RETRY);
        }
        warn!(
            "REG_ID = 0x{:02X} after {} attempts, expected 0x{:02X}",
            found, CHIP_ID_ATTEMPTS, CHIP_ID
        );
        Err(Error::ChipId {
            found,
            expected: CHIP_ID,
        })
    }

    fn reset_coprocessor(&mut self) -> Result<()> {
        self.eve.wr8(REG_CPURESET, 1)?;
        self.eve.wr16(REG_CMD_READ, 0)?;
        self.eve.wr16(REG_CMD_WRITE, 0)?;
        self.eve.wr8(REG_CPURESET, 0)?;
        thread::sleep(COPROCESSOR_RESET_DELAY);
        Ok(())
    }

    fn program_timing(&mut self) -> Result<()> {
        let t = self.timing;
        self.eve.wr16(REG_HCYCLE, t.hcycle)?;
        self.eve.wr16(REG_HOFFSET, t.hoffset)?;
        self.eve.wr16(REG_HSYNC0, t.hsync0)?;
        self.eve.wr16(REG_HSYNC1, t.hsync1)?;
        self.eve.wr16(REG_VCYCLE, t.vcycle)?;
        self.eve.wr16(REG_VOFFSET, t.voffset)?;
        self.eve.wr16(REG_VSYNC0, t.vsync0)?;
        self.eve.wr16(REG_VSYNC1, t.vsync1)?;
        self.eve.wr16(REG_SWIZZLE, t.swizzle)?;
        self.eve.wr8(REG_PCLK_POL, t.pclk_pol)?;
        self.eve.wr16(REG_HSIZE, t.width)?;
        self.eve.wr16(REG_VSIZE, t.height)?;
        self.eve.wr8(REG_CSPREAD, t.cspread)?;
        self.eve.wr8(REG_DITHER, t.dither)?;
        self.eve.wr8(REG_ROTATE, t.rotate)?;
        debug!(
            "Display timing: {}x{}, PCLK sys/{}, rotate {}",
            t.width, t.height, t.pclk_div, t.rotate
        );
        Ok(())
    }

    /// Runs one full-screen coprocessor scene on a black background.
    ///
    /// `words` is the number of ring words `body` emits.
    fn scene<F>(&mut self, color: Rgb, words: usize, body: F) -> Result<()>
    where
        F: FnOnce(&mut EveClient<T>) -> Result<()>,
    {
        let needed = (words + SCENE_OVERHEAD_WORDS) * 4;
        if needed > RING_CAPACITY {
            return Err(Error::InvalidArgument("scene does not fit the command ring"));
        }
        let eve = &mut self.eve;
        eve.cmd_begin()?;
        eve.wait_cmd_space(needed, CMD_SPACE_TIMEOUT)?;
        eve.cmd_word(CMD_DLSTART)?;
        eve.cmd_word(dl::clear_color_rgb(0, 0, 0))?;
        eve.cmd_word(dl::clear(true, true, true))?;
        eve.cmd_word(dl::color_rgb(color.r, color.g, color.b))?;
        body(eve)?;
        eve.cmd_word(dl::display())?;
        eve.cmd_word(CMD_SWAP)?;
        eve.cmd_end()?;
        eve.cmd_wait(CMD_WAIT_TIMEOUT)
    }

    /// Resolves an optional anchor to a position and widget options.
    fn anchor(&self, x: Option<i16>, y: Option<i16>) -> (i16, i16, u16) {
        let (cx, cy) = self.timing.center();
        let options = if x.is_none() && y.is_none() {
            OPT_CENTER
        } else {
            0
        };
        (x.unwrap_or(cx), y.unwrap_or(cy), options)
    }

    /// Draws `text` with a ROM font. Centered when no position is given.
    pub fn display_text(
        &mut self,
        text: &str,
        x: Option<i16>,
        y: Option<i16>,
        font: i16,
        color: Rgb,
    ) -> Result<()> {
        self.require(DriverState::Active, "display text")?;
        let (px, py, options) = self.anchor(x, y);
        let string_words = (text.len() + 1).div_ceil(4);
        self.scene(color, 3 + string_words, |eve| {
            eve.cmd_word(CMD_TEXT)?;
            eve.cmd_word(dl::pack_i16(px, py))?;
            eve.cmd_word(dl::pack_i16(font, options as i16))?;
            eve.cmd_string(text)
        })?;
        debug!("Displayed text ({} bytes) at ({}, {})", text.len(), px, py);
        Ok(())
    }

    /// Draws a mirror request.
    pub fn mirror(&mut self, request: &MirrorRequest) -> Result<()> {
        self.display_text(
            &request.text,
            request.x,
            request.y,
            request.font,
            request.color,
        )
    }

    /// Draws a signed number with the coprocessor's number widget.
    pub fn display_number(
        &mut self,
        number: i32,
        x: Option<i16>,
        y: Option<i16>,
        font: i16,
        color: Rgb,
    ) -> Result<()> {
        self.require(DriverState::Active, "display number")?;
        let (px, py, _) = self.anchor(x, y);
        self.scene(color, 4, |eve| {
            eve.cmd_word(CMD_NUMBER)?;
            eve.cmd_word(dl::pack_i16(px, py))?;
            eve.cmd_word(dl::pack_i16(font, OPT_CENTER as i16))?;
            eve.cmd_word(number as u32)
        })
    }

    /// Uploads an RGB565 bitmap to `dest` in RAM_G and shows it full screen.
    ///
    /// `data` is either raw little-endian RGB565 or a zlib stream of it;
    /// compressed data goes through the coprocessor's inflate command, raw
    /// data is written directly (truncated to `width * height * 2`).
    pub fn display_bitmap_rgb565(
        &mut self,
        data: &[u8],
        width: u16,
        height: u16,
        dest: u32,
    ) -> Result<()> {
        self.require(DriverState::Active, "display bitmap")?;
        if width == 0 || height == 0 || width >= 2048 || height >= 2048 {
            return Err(Error::InvalidArgument("bitmap dimensions out of range"));
        }
        let expected_raw = width as usize * height as usize * 2;
        let stride = width * 2;

        if looks_like_zlib(data, expected_raw) {
            debug!("Inflating {} byte bitmap into {:#08X}", data.len(), dest);
            self.eve.cmd_inflate(dest, data)?;
        } else {
            let raw = &data[..data.len().min(expected_raw)];
            debug!("Writing {} byte raw bitmap to {:#08X}", raw.len(), dest);
            self.eve.wr_bulk(dest, raw)?;
        }

        let eve = &mut self.eve;
        eve.cmd_begin()?;
        eve.cmd_word(CMD_DLSTART)?;
        eve.cmd_word(dl::clear_color_rgb(0, 0, 0))?;
        eve.cmd_word(dl::clear(true, true, true))?;
        eve.cmd_word(dl::bitmap_handle(0))?;
        eve.cmd_word(dl::bitmap_source(dest))?;
        eve.cmd_word(dl::bitmap_layout(FORMAT_RGB565, stride & 0x3FF, height & 0x1FF))?;
        eve.cmd_word(dl::bitmap_layout_h((stride >> 10) as u8, (height >> 9) as u8))?;
        eve.cmd_word(dl::bitmap_size(false, false, false, width & 0x1FF, height & 0x1FF))?;
        eve.cmd_word(dl::bitmap_size_h((width >> 9) as u8, (height >> 9) as u8))?;
        eve.cmd_word(dl::begin(Primitive::Bitmaps))?;
        eve.cmd_word(dl::vertex2ii(0, 0, 0, 0))?;
        eve.cmd_word(dl::end())?;
        eve.cmd_word(dl::display())?;
        eve.cmd_word(CMD_SWAP)?;
        eve.cmd_end()?;
        eve.cmd_wait(CMD_WAIT_TIMEOUT)
    }

    /// Loads an image file, scales it to the panel and shows it.
    pub fn display_image<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.require(DriverState::Active, "display image")?;
        let image = load_panel_image(path.as_ref())?;
        let raw = image_to_rgb565(&image);
        let packed = compress_zlib(&raw);
        info!(
            "Showing {} ({} bytes RGB565, {} bytes compressed)",
            path.as_ref().display(),
            raw.len(),
            packed.len()
        );
        let payload = if packed.len() < raw.len() { &packed } else { &raw };
        self.display_bitmap_rgb565(payload, self.timing.width, self.timing.height, RAM_G)
    }

    /// Fills the screen with one color using a direct display list.
    pub fn clear_screen(&mut self, color: Rgb) -> Result<()> {
        self.require(DriverState::Active, "clear screen")?;
        self.eve.dl_start();
        self.eve.dl_word(dl::clear_color_rgb(color.r, color.g, color.b))?;
        self.eve.dl_word(dl::clear(true, true, true))?;
        self.eve.dl_word(dl::display())?;
        self.eve.dl_swap()
    }

    /// Coprocessor access for custom scenes.
    pub fn coprocessor(&mut self) -> Result<&mut EveClient<T>> {
        self.require(DriverState::Active, "use coprocessor")?;
        Ok(&mut self.eve)
    }

    /// Blanks the panel, turns off backlight and pixel clock, then drives
    /// PD# low. The USB handle stays open; call [`close`](Self::close) next.
    ///
    /// PD# is driven low even when blanking fails; the first error wins.
    pub fn shutdown(&mut self) -> Result<()> {
        let blanked = match self.state {
            DriverState::Active => self.blank_and_stop_clock(),
            DriverState::Opened => Ok(()),
            DriverState::Closed => {
                return Err(Error::InvalidState {
                    operation: "shut down",
                    state: self.state,
                })
            }
        };
        if let Err(e) = &blanked {
            warn!("Blanking failed during shutdown: {}", e);
        }
        self.state = DriverState::Opened;
        let powered_down = self.eve.spi_mut().power_down();
        blanked.and(powered_down)?;
        info!("Partner display powered down");
        Ok(())
    }

    fn blank_and_stop_clock(&mut self) -> Result<()> {
        self.clear_screen(Rgb::BLACK)?;
        thread::sleep(SHUTDOWN_CLEAR_DELAY);
        let gpio = self.eve.rd8(REG_GPIO)?;
        self.eve.wr8(REG_GPIO, gpio & !GPIO_BACKLIGHT)?;
        self.eve.wr8(REG_PCLK, 0)?;
        debug!("Pixel clock stopped, backlight off");
        Ok(())
    }

    /// Releases the USB handle. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        self.eve.spi_mut().close();
        self.eve.dl_start();
        self.state = DriverState::Closed;
    }
}
