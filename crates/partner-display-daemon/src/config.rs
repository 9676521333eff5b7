//! Configuration management.

#![allow(dead_code)]

use anyhow::{Context, Result};
use partner_display_hw::eve::registers::clamp_font;
use partner_display_hw::{Rgb, DEFAULT_SPI_HZ, FT232H_PID, FTDI_VID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::manager::{ManagerSettings, MirrorStyle};

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Whether text is mirrored to the partner display
    #[serde(default)]
    pub enabled: bool,

    /// Device presence poll interval in milliseconds
    #[serde(default = "default_poll")]
    pub poll: u64,

    /// Quiet period before a text change is sent, in milliseconds
    #[serde(default = "default_debounce")]
    pub debounce: u64,

    /// Wake the presence poll on USB hotplug events when supported
    #[serde(default = "default_hotplug")]
    pub hotplug: bool,

    /// Mirrored text appearance
    #[serde(default)]
    pub display: DisplayConfig,

    /// USB bridge selection
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Mirrored text appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// ROM font handle (16-34)
    #[serde(default = "default_font")]
    pub font: i16,

    /// Text color as "#RRGGBB"
    #[serde(default = "default_color")]
    pub color: String,

    /// Remove markup tags such as `<break/>` before display
    #[serde(default = "default_strip_tags")]
    pub strip_tags: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font: default_font(),
            color: default_color(),
            strip_tags: default_strip_tags(),
        }
    }
}

/// USB bridge selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id")]
    pub product_id: u16,

    /// SPI clock in Hz (up to 30 MHz)
    #[serde(default = "default_spi_hz")]
    pub spi_hz: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            spi_hz: default_spi_hz(),
        }
    }
}

// Default value functions
fn default_poll() -> u64 {
    3000
}

fn default_debounce() -> u64 {
    100
}

fn default_hotplug() -> bool {
    true
}

fn default_font() -> i16 {
    31
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

fn default_strip_tags() -> bool {
    true
}

fn default_vendor_id() -> u16 {
    FTDI_VID
}

fn default_product_id() -> u16 {
    FT232H_PID
}

fn default_spi_hz() -> u32 {
    DEFAULT_SPI_HZ
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            warn!(
                "Configuration file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }

    /// Manager timing and text style. Out-of-range values are corrected.
    pub fn manager_settings(&self) -> ManagerSettings {
        let color = self.display.color.parse::<Rgb>().unwrap_or_else(|_| {
            warn!(
                "Invalid display color {:?}, using white",
                self.display.color
            );
            Rgb::WHITE
        });
        let font = clamp_font(self.display.font);
        if font != self.display.font {
            warn!("Font {} out of range, using {}", self.display.font, font);
        }

        ManagerSettings {
            poll: Duration::from_millis(self.poll.max(1)),
            debounce: Duration::from_millis(self.debounce),
            hotplug: self.hotplug,
            style: MirrorStyle {
                font,
                color,
                strip_tags: self.display.strip_tags,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            poll: default_poll(),
            debounce: default_debounce(),
            hotplug: default_hotplug(),
            display: DisplayConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.enabled);
        assert_eq!(config.poll, 3000);
        assert_eq!(config.debounce, 100);
        assert_eq!(config.display.font, 31);
        assert_eq!(config.device.vendor_id, 0x0403);
        assert_eq!(config.device.product_id, 0x6014);
        assert_eq!(config.device.spi_hz, 15_000_000);
    }

    #[test]
    fn test_partial_tables() {
        let config: Config = toml::from_str(
            r##"
            enabled = true
            poll = 1000

            [display]
            color = "#00FF80"
            "##,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.poll, 1000);
        assert_eq!(config.debounce, 100);
        assert_eq!(config.display.color, "#00FF80");
        assert!(config.display.strip_tags);

        let settings = config.manager_settings();
        assert_eq!(settings.poll, Duration::from_millis(1000));
        assert_eq!(settings.style.color, Rgb::new(0, 255, 128));
        assert_eq!(settings.style.font, 31);
    }

    #[test]
    fn test_manager_settings_corrects_bad_values() {
        let mut config = Config::default();
        config.display.font = 50;
        config.display.color = "teal".into();
        config.poll = 0;
        let settings = config.manager_settings();
        assert_eq!(settings.style.font, 34);
        assert_eq!(settings.style.color, Rgb::WHITE);
        assert_eq!(settings.poll, Duration::from_millis(1));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("partnerd-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.enabled = true;
        config.device.spi_hz = 6_000_000;
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("/nonexistent/partnerd.toml").unwrap();
        assert_eq!(config, Config::default());
        assert!(Config::load("/nonexistent/partnerd.toml").is_err());
    }
}
