//! User configuration: TOML file plus environment overrides.
//!
//! Stored in the platform-appropriate config directory:
//!   macOS:   ~/Library/Application Support/clan-drop-webhook/config.toml
//!   Linux:   ~/.config/clan-drop-webhook/config.toml
//!   Windows: %APPDATA%/clan-drop-webhook/config.toml
//!
//! A missing file is not an error; every field has a default.

use crate::capture::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WEBHOOK_ENV: &str = "CLAN_DROP_WEBHOOK";
pub const PLAYER_ENV: &str = "CLAN_DROP_PLAYER";

/// Config key whose change triggers webhook revalidation.
pub const WEBHOOK_KEY: &str = "webhook";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord webhook URL.
    pub webhook: String,
    /// Attach a screenshot to each drop.
    pub screenshot: bool,
    /// Crop the screenshot to the chat box.
    pub only_chat: bool,
    /// Also reference the attached screenshot from an embed.
    pub embed_screenshot: bool,
    pub auto_message_enabled: bool,
    pub auto_message_date: bool,
    pub auto_message: String,
    /// Local player name, for hosts that can't ask the game.
    pub player_name: Option<String>,
    pub screenshots_dir: Option<PathBuf>,
    /// Chat box rectangle, for hosts without a widget tree.
    pub chatbox: Option<Rect>,
    pub validation_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook: String::new(),
            screenshot: false,
            only_chat: false,
            embed_screenshot: false,
            auto_message_enabled: false,
            auto_message_date: true,
            auto_message: String::new(),
            player_name: None,
            screenshots_dir: None,
            chatbox: None,
            validation_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Base directory for the config file.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clan-drop-webhook")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reads `path` (defaults if absent) and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml_str(&contents)?
        } else {
            log::info!("[CONFIG] No config at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `CLAN_DROP_WEBHOOK` / `CLAN_DROP_PLAYER` from `lookup`.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(webhook) = lookup(WEBHOOK_ENV).filter(|v| !v.trim().is_empty()) {
            log::info!("[CONFIG] Webhook overridden from {}", WEBHOOK_ENV);
            self.webhook = webhook.trim().to_string();
        }
        if let Some(player) = lookup(PLAYER_ENV).filter(|v| !v.trim().is_empty()) {
            self.player_name = Some(player.trim().to_string());
        }
    }

    /// Root directory for saved screenshots.
    pub fn screenshots_root(&self) -> PathBuf {
        match &self.screenshots_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".runelite")
                .join("screenshots"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
