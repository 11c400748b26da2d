//! Clan Drop Webhook posts clan drop broadcasts to a Discord webhook.
//!
//! This is the crate root that wires together:
//! - Game client seam (host.rs)
//! - Drop detection and auto-message text (notify.rs)
//! - Screen capture domain (capture/)
//! - Screenshot storage (persist.rs)
//! - Discord webhook domain (webhook/)
//! - The event-driven pipeline (notifier.rs)
//! - A standalone desktop host (desktop.rs)

pub mod capture;
pub mod config;
pub mod desktop;
pub mod host;
pub mod notifier;
pub mod notify;
pub mod persist;
pub mod webhook;

use config::Config;
use std::path::PathBuf;

/// Entry point, called by the binary.
///
/// Loads `.env`, initialises logging, reads the config (path from the first
/// argument, else the platform default) and runs the desktop host until
/// stdin closes.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    log::info!("Clan Drop Webhook starting up ({})", config_path.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    runtime.block_on(desktop::run_desktop(config, config_path))
}
