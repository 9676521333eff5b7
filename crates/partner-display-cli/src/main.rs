//! Partner Display Control Tool
//!
//! Talks to the partner display directly over USB for bring-up and testing.
//! Stop partnerd first; only one process can claim the bridge.

mod scenes;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use partner_display_hw::{
    is_device_connected, NusbTransport, PartnerDisplay, Rgb, DEFAULT_SPI_HZ, FT232H_PID,
    FTDI_VID,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "partnerctl")]
#[command(about = "Bring-up and test tool for the partner display")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// USB vendor ID of the bridge
    #[arg(long, default_value_t = FTDI_VID, value_parser = parse_u16)]
    vid: u16,

    /// USB product ID of the bridge
    #[arg(long, default_value_t = FT232H_PID, value_parser = parse_u16)]
    pid: u16,

    /// SPI clock in Hz (up to 30 MHz)
    #[arg(long, default_value_t = DEFAULT_SPI_HZ)]
    spi_hz: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the bridge is attached
    Discover,
    /// Bring the display up and show a greeting
    Init,
    /// Show text
    Text {
        message: String,

        /// X position (centered when neither X nor Y is given)
        #[arg(short, long, allow_negative_numbers = true)]
        x: Option<i16>,

        /// Y position
        #[arg(short, long, allow_negative_numbers = true)]
        y: Option<i16>,

        /// ROM font (16-34)
        #[arg(long, default_value = "31")]
        font: i16,

        /// Color in hex format (e.g., #FF0000 for red)
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
    },
    /// Show a number
    Number {
        #[arg(allow_negative_numbers = true)]
        value: i32,

        /// ROM font (16-34)
        #[arg(long, default_value = "31")]
        font: i16,

        /// Color in hex format
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
    },
    /// Fill the display with a solid color
    Color {
        /// Color in hex format (e.g., #00FF00)
        color: String,
    },
    /// Cycle through solid colors
    Cycle {
        /// Time per color in milliseconds
        #[arg(long, default_value = "1000")]
        dwell: u64,
    },
    /// Show an image file scaled to 480x128
    Image { path: PathBuf },
    /// Show color bars
    Pattern,
    /// Draw a border and three circles
    Geometry,
    /// Scroll text across the display
    Animate {
        #[arg(default_value = scenes::SCROLL_MESSAGE)]
        message: String,
    },
    /// Run every test scene
    All,
    /// Blank the display and power the controller down
    Off,
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid ID {:?}: {}", s, e))
}

fn parse_color(s: &str) -> Result<Rgb> {
    s.parse()
        .with_context(|| format!("Invalid color: {}. Use #RRGGBB", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Discover = cli.command {
        let found = is_device_connected(cli.vid, cli.pid);
        println!(
            "Bridge {:04X}:{:04X}: {}",
            cli.vid,
            cli.pid,
            if found { "connected" } else { "not found" }
        );
        return Ok(());
    }

    let transport = NusbTransport::new(cli.vid, cli.pid);
    let mut display = PartnerDisplay::with_transport(transport, cli.spi_hz);
    display
        .open()
        .context("Failed to open the partner display. Is partnerd running?")?;

    let result = run(&mut display, cli.command);
    display.close();
    result
}

fn run(display: &mut PartnerDisplay<NusbTransport>, command: Commands) -> Result<()> {
    if let Commands::Off = command {
        display.shutdown()?;
        println!("Display powered down");
        return Ok(());
    }

    display.init().context("Display bring-up failed")?;

    match command {
        Commands::Init => {
            display.display_text("Hello", None, None, 31, Rgb::WHITE)?;
            println!("Display initialized");
        }
        Commands::Text {
            message,
            x,
            y,
            font,
            color,
        } => {
            let color = parse_color(&color)?;
            if !(16..=34).contains(&font) {
                anyhow::bail!("Font must be between 16 and 34");
            }
            display.display_text(&message, x, y, font, color)?;
            println!("Showing: {}", message);
        }
        Commands::Number { value, font, color } => {
            let color = parse_color(&color)?;
            if !(16..=34).contains(&font) {
                anyhow::bail!("Font must be between 16 and 34");
            }
            display.display_number(value, None, None, font, color)?;
            println!("Showing: {}", value);
        }
        Commands::Color { color } => {
            let rgb = parse_color(&color)?;
            display.clear_screen(rgb)?;
            println!("Display cleared to: {}", rgb);
        }
        Commands::Cycle { dwell } => {
            scenes::color_cycle(display, Duration::from_millis(dwell))?;
        }
        Commands::Image { path } => {
            display
                .display_image(&path)
                .with_context(|| format!("Failed to show {}", path.display()))?;
            println!("Showing: {}", path.display());
        }
        Commands::Pattern => scenes::color_bar_pattern(display)?,
        Commands::Geometry => scenes::geometry(display)?,
        Commands::Animate { message } => scenes::scroll_text(display, &message)?,
        Commands::All => scenes::run_all(display)?,
        Commands::Discover | Commands::Off => unreachable!("handled before bring-up"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_u16("0x0403"), Ok(0x0403));
        assert_eq!(parse_u16("0X6014"), Ok(0x6014));
        assert_eq!(parse_u16("24596"), Ok(0x6014));
        assert!(parse_u16("0xZZ").is_err());
        assert!(parse_u16("70000").is_err());
    }

    #[test]
    fn test_text_arguments() {
        let cli = Cli::try_parse_from([
            "partnerctl", "--vid", "0x0403", "text", "hi", "-x", "-20", "--color", "#00FF00",
        ])
        .unwrap();
        assert_eq!(cli.vid, 0x0403);
        assert_eq!(cli.spi_hz, 15_000_000);
        match cli.command {
            Commands::Text { message, x, y, font, color } => {
                assert_eq!(message, "hi");
                assert_eq!(x, Some(-20));
                assert_eq!(y, None);
                assert_eq!(font, 31);
                assert_eq!(parse_color(&color).unwrap(), Rgb::new(0, 255, 0));
            }
            _ => panic!("expected text command"),
        }
    }

    #[test]
    fn test_bad_color() {
        assert!(parse_color("green").is_err());
    }
}
