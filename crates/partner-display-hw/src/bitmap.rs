//! RGB565 conversion and zlib packing for bitmap uploads.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;

use crate::{Result, DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Converts RGB888 to RGB565.
#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = (r >> 3) as u16;
    let g6 = (g >> 2) as u16;
    let b5 = (b >> 3) as u16;
    (r5 << 11) | (g6 << 5) | b5
}

/// Converts RGB565 back to RGB888, replicating high bits into the low ones.
#[inline]
pub fn rgb565_to_rgb888(pixel: u16) -> (u8, u8, u8) {
    let r = ((pixel >> 11) & 0x1F) as u8;
    let g = ((pixel >> 5) & 0x3F) as u8;
    let b = (pixel & 0x1F) as u8;
    ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Packs an image row-major as little-endian RGB565.
pub fn image_to_rgb565(image: &RgbImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(image.width() as usize * image.height() as usize * 2);
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        out.extend_from_slice(&rgb888_to_rgb565(r, g, b).to_le_bytes());
    }
    out
}

/// Loads an image file and scales it to exactly fill the panel.
pub fn load_panel_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let image = image::open(path.as_ref())?;
    Ok(image
        .resize_exact(DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32, FilterType::Triangle)
        .to_rgb8())
}

/// Wraps `data` in a best-compression zlib stream.
pub fn compress_zlib(data: &[u8]) -> Vec<u8> {
    miniz_oxide::deflate::compress_to_vec_zlib(data, 9)
}

/// Guesses whether a bitmap buffer is zlib-compressed rather than raw RGB565.
///
/// The first two bytes of a zlib stream form a multiple of 31 when read
/// big-endian; raw pixel data also has to fill the whole bitmap.
pub fn looks_like_zlib(data: &[u8], expected_raw: usize) -> bool {
    data.len() >= 2
        && u16::from_be_bytes([data[0], data[1]]) % 31 == 0
        && data.len() < expected_raw
}

/// Eight vertical color bars as raw little-endian RGB565.
pub fn color_bars(width: u16, height: u16) -> Vec<u8> {
    const BARS: [u16; 8] = [
        0xF800, // Red
        0x07E0, // Green
        0x001F, // Blue
        0xFFFF, // White
        0xFFE0, // Yellow
        0xF81F, // Magenta
        0x07FF, // Cyan
        0x0000, // Black
    ];
    let width = width as usize;
    let bar_width = (width / BARS.len()).max(1);
    let row: Vec<u8> = (0..width)
        .flat_map(|x| BARS[(x / bar_width).min(BARS.len() - 1)].to_le_bytes())
        .collect();
    row.repeat(height as usize)
}
