//! Panel geometry, video timing and colors.

use std::fmt;
use std::str::FromStr;

use crate::{Error, DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Video timing and output configuration for the attached panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTiming {
    pub width: u16,
    pub height: u16,
    pub hcycle: u16,
    pub hoffset: u16,
    pub hsync0: u16,
    pub hsync1: u16,
    pub vcycle: u16,
    pub voffset: u16,
    pub vsync0: u16,
    pub vsync1: u16,
    /// Pixel clock divider applied to the system clock.
    pub pclk_div: u8,
    pub pclk_pol: u8,
    pub swizzle: u16,
    pub cspread: u8,
    pub dither: u8,
    /// Mirrored landscape so the person facing the panel reads it correctly.
    pub rotate: u8,
}

impl PanelTiming {
    /// The 480x128 partner window panel.
    pub const PARTNER_WINDOW: PanelTiming = PanelTiming {
        width: DISPLAY_WIDTH,
        height: DISPLAY_HEIGHT,
        hcycle: 531,
        hoffset: 43,
        hsync0: 0,
        hsync1: 4,
        vcycle: 292,
        voffset: 84,
        vsync0: 0,
        vsync1: 4,
        pclk_div: 9,
        pclk_pol: 1,
        swizzle: 0,
        cspread: 0,
        dither: 1,
        rotate: 4,
    };

    /// Screen center, where untargeted text is anchored.
    pub fn center(&self) -> (i16, i16) {
        ((self.width / 2) as i16, (self.height / 2) as i16)
    }
}

impl Default for PanelTiming {
    fn default() -> Self {
        Self::PARTNER_WINDOW
    }
}

/// 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s).ok_or(Error::InvalidArgument("color must be #RRGGBB"))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
