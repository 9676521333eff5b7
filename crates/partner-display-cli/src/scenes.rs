//! Test scenes for exercising a freshly wired display.

use std::thread;
use std::time::Duration;

use partner_display_hw::bitmap::{color_bars, compress_zlib};
use partner_display_hw::eve::client::CMD_WAIT_TIMEOUT;
use partner_display_hw::eve::dl;
use partner_display_hw::eve::registers::{Primitive, CMD_DLSTART, CMD_SWAP, RAM_G};
use partner_display_hw::{
    PartnerDisplay, Result, Rgb, UsbTransport, DISPLAY_HEIGHT, DISPLAY_WIDTH,
};
use tracing::debug;

/// Solid fills shown by the color cycle.
pub const CYCLE_COLORS: [(Rgb, &str); 8] = [
    (Rgb::new(255, 0, 0), "Red"),
    (Rgb::new(0, 255, 0), "Green"),
    (Rgb::new(0, 0, 255), "Blue"),
    (Rgb::new(255, 255, 255), "White"),
    (Rgb::new(255, 255, 0), "Yellow"),
    (Rgb::new(255, 0, 255), "Magenta"),
    (Rgb::new(0, 255, 255), "Cyan"),
    (Rgb::new(0, 0, 0), "Black"),
];

const TEXT_SAMPLES: [(i16, Rgb, &str); 3] = [
    (28, Rgb::new(200, 200, 200), "Font 28: Small text"),
    (30, Rgb::new(0, 255, 128), "Font 30: Green text"),
    (31, Rgb::new(255, 200, 0), "Font 31: Yellow!"),
];

/// Horizontal step and frame time of the scrolling text.
const SCROLL_STEP: i32 = 4;
const SCROLL_FRAME: Duration = Duration::from_millis(30);

/// Rough advance of one glyph in font 31.
const SCROLL_GLYPH_WIDTH: i32 = 20;

pub const SCROLL_MESSAGE: &str = "Partner Window";

/// Fills the screen with each of [`CYCLE_COLORS`] in turn.
pub fn color_cycle<T: UsbTransport>(display: &mut PartnerDisplay<T>, dwell: Duration) -> Result<()> {
    for (color, name) in CYCLE_COLORS {
        println!("  Showing: {} ({})", name, color);
        display.clear_screen(color)?;
        thread::sleep(dwell);
    }
    Ok(())
}

/// Shows `message` centered, then a few font and color samples.
pub fn text_samples<T: UsbTransport>(display: &mut PartnerDisplay<T>, message: &str) -> Result<()> {
    println!("  Showing: {:?}", message);
    display.display_text(message, None, None, 31, Rgb::WHITE)?;
    thread::sleep(Duration::from_secs(2));

    for (font, color, text) in TEXT_SAMPLES {
        println!("  Font {}: {:?}", font, text);
        display.display_text(text, None, None, font, color)?;
        thread::sleep(Duration::from_millis(1500));
    }
    Ok(())
}

/// Display list for the geometry scene: a white border and three circles.
pub fn geometry_words() -> Vec<u32> {
    let px = |v: i32| v * 16;
    let mut words = vec![
        dl::clear_color_rgb(0, 0, 0),
        dl::clear(true, true, true),
        dl::color_rgb(255, 255, 255),
        dl::line_width(16),
        dl::begin(Primitive::Rects),
        dl::vertex2f(px(2), px(2)),
        dl::vertex2f(px(DISPLAY_WIDTH as i32 - 2), px(DISPLAY_HEIGHT as i32 - 2)),
        dl::end(),
    ];
    let cy = DISPLAY_HEIGHT as i32 / 2;
    for (i, (r, g, b)) in [(255, 0, 0), (0, 255, 0), (0, 0, 255)].into_iter().enumerate() {
        let cx = DISPLAY_WIDTH as i32 * (i as i32 + 1) / 4;
        words.extend([
            dl::color_rgb(r, g, b),
            dl::point_size(40 * 16),
            dl::begin(Primitive::Points),
            dl::vertex2f(px(cx), px(cy)),
            dl::end(),
        ]);
    }
    words.push(dl::display());
    words
}

/// Draws [`geometry_words`] through the coprocessor.
pub fn geometry<T: UsbTransport>(display: &mut PartnerDisplay<T>) -> Result<()> {
    let eve = display.coprocessor()?;
    eve.cmd_begin()?;
    eve.cmd_word(CMD_DLSTART)?;
    for word in geometry_words() {
        eve.cmd_word(word)?;
    }
    eve.cmd_word(CMD_SWAP)?;
    eve.cmd_end()?;
    eve.cmd_wait(CMD_WAIT_TIMEOUT)
}

/// Uploads eight vertical color bars as a compressed bitmap.
pub fn color_bar_pattern<T: UsbTransport>(display: &mut PartnerDisplay<T>) -> Result<()> {
    let raw = color_bars(DISPLAY_WIDTH, DISPLAY_HEIGHT);
    let packed = compress_zlib(&raw);
    println!(
        "  Pattern: {}x{}, {} B -> {} B compressed",
        DISPLAY_WIDTH,
        DISPLAY_HEIGHT,
        raw.len(),
        packed.len()
    );
    display.display_bitmap_rgb565(&packed, DISPLAY_WIDTH, DISPLAY_HEIGHT, RAM_G)
}

/// X positions of a message scrolling from the right edge until it has left
/// the screen on the left, or until the coordinate leaves the `i16` range.
pub fn scroll_positions(message: &str) -> impl Iterator<Item = i16> {
    let glyphs = i32::try_from(message.chars().count()).unwrap_or(i32::MAX);
    let width = glyphs.saturating_mul(SCROLL_GLYPH_WIDTH);
    let start = DISPLAY_WIDTH as i32;
    (0..)
        .map(move |step: i32| start - step * SCROLL_STEP)
        .take_while(move |x| *x > -width)
        .map_while(|x| i16::try_from(x).ok())
}

/// Scrolls `message` right to left across the middle of the screen.
pub fn scroll_text<T: UsbTransport>(display: &mut PartnerDisplay<T>, message: &str) -> Result<()> {
    let y = DISPLAY_HEIGHT as i16 / 2;
    let mut frames = 0;
    for x in scroll_positions(message) {
        display.display_text(message, Some(x), Some(y), 31, Rgb::WHITE)?;
        thread::sleep(SCROLL_FRAME);
        frames += 1;
    }
    debug!("Scrolled {:?} in {} frames", message, frames);
    Ok(())
}

/// Runs every scene in sequence.
pub fn run_all<T: UsbTransport>(display: &mut PartnerDisplay<T>) -> Result<()> {
    println!("\n--- Color cycle ---");
    color_cycle(display, Duration::from_secs(1))?;
    println!("\n--- Text ---");
    text_samples(display, "Hello from partnerctl!")?;
    println!("\n--- Geometry ---");
    geometry(display)?;
    thread::sleep(Duration::from_secs(3));
    println!("\n--- Color bars ---");
    color_bar_pattern(display)?;
    thread::sleep(Duration::from_secs(3));
    println!("\n--- Animation ---");
    scroll_text(display, SCROLL_MESSAGE)?;
    println!("\nAll scenes complete");
    Ok(())
}
