//! Partner Display Daemon
//!
//! Mirrors text lines read from stdin onto the outward-facing partner display
//! while mirroring is enabled and the device is attached.

mod config;
mod hardware;
mod manager;
mod text;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use hardware::UsbBackend;
use manager::PartnerWindowManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load_or_default(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    let (enabled_tx, enabled_rx) = watch::channel(config.enabled);
    let backend = UsbBackend::new(&config.device, config.hotplug);
    let mut manager = PartnerWindowManager::new(backend, config.manager_settings(), enabled_rx);
    let mut connected = manager.subscribe_device_connected();
    let mut active = manager.subscribe_active();
    manager.start()?;

    // Setup Unix signal handlers
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => manager.update_text(line),
                Ok(None) => {
                    info!("Text input closed, keeping the last line on display");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read text input: {}", e);
                    stdin_open = false;
                }
            },
            Ok(()) = connected.changed() => {
                let attached = *connected.borrow_and_update();
                info!("Partner display {}", if attached { "attached" } else { "detached" });
            }
            Ok(()) = active.changed() => {
                let mirroring = *active.borrow_and_update();
                info!("Partner window {}", if mirroring { "showing text" } else { "idle" });
            }
            _ = sighup.recv() => {
                match Config::load(&config_path) {
                    Ok(reloaded) => {
                        info!("Reloaded configuration: mirroring {}",
                            if reloaded.enabled { "enabled" } else { "disabled" });
                        enabled_tx.send_replace(reloaded.enabled);
                    }
                    Err(e) => warn!("Failed to reload configuration: {:#}", e),
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    manager.stop().await;
    Ok(())
}
