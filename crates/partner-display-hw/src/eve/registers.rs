//! Register map and command codes of the EVE controller.
//!
//! Address space:
//! - `RAM_G` general graphics RAM at 0x000000 (1 MiB)
//! - `RAM_DL` display list at 0x300000 (8 KiB)
//! - control registers from 0x302000
//! - `RAM_CMD` coprocessor ring at 0x308000 (4 KiB)

pub const RAM_G: u32 = 0x000000;
pub const RAM_DL: u32 = 0x300000;
pub const RAM_CMD: u32 = 0x308000;

/// Display list RAM size in bytes.
pub const RAM_DL_SIZE: u32 = 8 * 1024;

/// Coprocessor ring size in bytes.
pub const RAM_CMD_SIZE: u16 = 4 * 1024;

/// Addresses travel as 22 bits on the wire (6 in the first header byte).
pub const ADDRESS_MASK: u32 = 0x3F_FFFF;

/// Value read from `REG_ID` once the controller is alive.
pub const CHIP_ID: u8 = 0x7C;

pub const REG_ID: u32 = 0x302000;
pub const REG_FRAMES: u32 = 0x302004;
pub const REG_CLOCK: u32 = 0x302008;
pub const REG_FREQUENCY: u32 = 0x30200C;
pub const REG_CPURESET: u32 = 0x302020;
pub const REG_HCYCLE: u32 = 0x30202C;
pub const REG_HOFFSET: u32 = 0x302030;
pub const REG_HSIZE: u32 = 0x302034;
pub const REG_HSYNC0: u32 = 0x302038;
pub const REG_HSYNC1: u32 = 0x30203C;
pub const REG_VCYCLE: u32 = 0x302040;
pub const REG_VOFFSET: u32 = 0x302044;
pub const REG_VSIZE: u32 = 0x302048;
pub const REG_VSYNC0: u32 = 0x30204C;
pub const REG_VSYNC1: u32 = 0x302050;
pub const REG_DLSWAP: u32 = 0x302054;
pub const REG_ROTATE: u32 = 0x302058;
pub const REG_DITHER: u32 = 0x302060;
pub const REG_SWIZZLE: u32 = 0x302064;
pub const REG_CSPREAD: u32 = 0x302068;
pub const REG_PCLK_POL: u32 = 0x30206C;
pub const REG_PCLK: u32 = 0x302070;
pub const REG_GPIO_DIR: u32 = 0x302090;
pub const REG_GPIO: u32 = 0x302094;
pub const REG_CMD_READ: u32 = 0x3020F8;
pub const REG_CMD_WRITE: u32 = 0x3020FC;
pub const REG_CMDB_SPACE: u32 = 0x302574;

/// Backlight enable bit in `REG_GPIO` / `REG_GPIO_DIR`.
pub const GPIO_BACKLIGHT: u8 = 0x80;

/// `REG_DLSWAP` value: swap after the current frame.
pub const DLSWAP_FRAME: u8 = 2;

/// Host commands, sent as `[cmd, 0x00, 0x00]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HostCommand {
    Active = 0x00,
    Standby = 0x41,
    Sleep = 0x42,
    ClockExternal = 0x44,
    ClockInternal = 0x48,
    PowerDown = 0x50,
    ClockSelect = 0x61,
    ResetPulse = 0x68,
}

/// Coprocessor command opcodes.
pub const CMD_DLSTART: u32 = 0xFFFF_FF00;
pub const CMD_SWAP: u32 = 0xFFFF_FF01;
pub const CMD_BGCOLOR: u32 = 0xFFFF_FF09;
pub const CMD_FGCOLOR: u32 = 0xFFFF_FF0A;
pub const CMD_TEXT: u32 = 0xFFFF_FF0C;
pub const CMD_BUTTON: u32 = 0xFFFF_FF0D;
pub const CMD_KEYS: u32 = 0xFFFF_FF0E;
pub const CMD_SPINNER: u32 = 0xFFFF_FF16;
pub const CMD_STOP: u32 = 0xFFFF_FF17;
pub const CMD_INFLATE: u32 = 0xFFFF_FF22;
pub const CMD_LOADIMAGE: u32 = 0xFFFF_FF24;
pub const CMD_NUMBER: u32 = 0xFFFF_FF2E;
pub const CMD_SETROTATE: u32 = 0xFFFF_FF36;
pub const CMD_SETBITMAP: u32 = 0xFFFF_FF42;

/// Horizontal and vertical centering for text and number widgets.
pub const OPT_CENTER: u16 = 0x0600;

/// Graphics primitives for `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Primitive {
    Bitmaps = 1,
    Points = 2,
    Lines = 3,
    LineStrip = 4,
    Rects = 9,
}

/// Bitmap pixel formats.
pub const FORMAT_RGB565: u8 = 7;

/// Built-in ROM fonts span handles 16 through 34.
pub const ROM_FONT_MIN: i16 = 16;
pub const ROM_FONT_MAX: i16 = 34;

/// Clamps a font handle to the ROM font range.
pub fn clamp_font(font: i16) -> i16 {
    font.clamp(ROM_FONT_MIN, ROM_FONT_MAX)
}
