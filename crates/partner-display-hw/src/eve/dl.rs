//! Display-list word encoders.
//!
//! Each function packs one 32-bit display-list instruction. Fields are
//! masked to their hardware width; `_h` variants carry the high bits of
//! sizes that do not fit the base instruction.

use super::registers::Primitive;

#[inline]
pub fn clear_color_rgb(r: u8, g: u8, b: u8) -> u32 {
    0x02 << 24 | rgb(r, g, b)
}

#[inline]
pub fn color_rgb(r: u8, g: u8, b: u8) -> u32 {
    0x04 << 24 | rgb(r, g, b)
}

#[inline]
pub fn color_a(alpha: u8) -> u32 {
    0x10 << 24 | alpha as u32
}

/// Clears the color, stencil and tag buffers selected by the flags.
#[inline]
pub fn clear(color: bool, stencil: bool, tag: bool) -> u32 {
    0x26 << 24 | (color as u32) << 2 | (stencil as u32) << 1 | tag as u32
}

/// Ends the display list.
#[inline]
pub fn display() -> u32 {
    0
}

#[inline]
pub fn begin(primitive: Primitive) -> u32 {
    0x1F << 24 | (primitive as u32 & 0x0F)
}

#[inline]
pub fn end() -> u32 {
    0x21 << 24
}

/// Integer vertex with bitmap handle and cell, 9-bit coordinates.
#[inline]
pub fn vertex2ii(x: u16, y: u16, handle: u8, cell: u8) -> u32 {
    2 << 30
        | (x as u32 & 0x1FF) << 21
        | (y as u32 & 0x1FF) << 12
        | (handle as u32 & 0x1F) << 7
        | (cell as u32 & 0x7F)
}

/// Vertex in 1/16 pixel units.
#[inline]
pub fn vertex2f(x: i32, y: i32) -> u32 {
    1 << 30 | (x as u32 & 0x7FFF) << 15 | (y as u32 & 0x7FFF)
}

/// Line width in 1/16 pixel units.
#[inline]
pub fn line_width(width: u16) -> u32 {
    0x0E << 24 | (width as u32 & 0xFFF)
}

/// Point radius in 1/16 pixel units.
#[inline]
pub fn point_size(radius: u16) -> u32 {
    0x0D << 24 | (radius as u32 & 0x1FFF)
}

#[inline]
pub fn bitmap_handle(handle: u8) -> u32 {
    0x05 << 24 | (handle as u32 & 0x1F)
}

#[inline]
pub fn bitmap_source(addr: u32) -> u32 {
    0x01 << 24 | (addr & 0xF_FFFF)
}

#[inline]
pub fn bitmap_layout(format: u8, stride: u16, height: u16) -> u32 {
    0x07 << 24 | (format as u32 & 0x1F) << 19 | (stride as u32 & 0x3FF) << 9 | (height as u32 & 0x1FF)
}

#[inline]
pub fn bitmap_layout_h(stride_high: u8, height_high: u8) -> u32 {
    0x28 << 24 | (stride_high as u32 & 0x3) << 2 | (height_high as u32 & 0x3)
}

#[inline]
pub fn bitmap_size(filter: bool, wrap_x: bool, wrap_y: bool, width: u16, height: u16) -> u32 {
    0x08 << 24
        | (filter as u32) << 20
        | (wrap_x as u32) << 19
        | (wrap_y as u32) << 18
        | (width as u32 & 0x1FF) << 9
        | (height as u32 & 0x1FF)
}

#[inline]
pub fn bitmap_size_h(width_high: u8, height_high: u8) -> u32 {
    0x29 << 24 | (width_high as u32 & 0x3) << 2 | (height_high as u32 & 0x3)
}

#[inline]
fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Packs two signed 16-bit values into one coprocessor argument word.
#[inline]
pub fn pack_i16(low: i16, high: i16) -> u32 {
    (low as u16 as u32) | (high as u16 as u32) << 16
}
