//! Drop detection and auto-message formatting.
//!
//! Pure functions. Callers pass the current time in.

use crate::config::Config;
use crate::host::{ChatMessage, ChatMessageType};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Phrases the game uses when a clan member gets loot or a pet.
pub const TRIGGER_PHRASES: &[&str] = &["received", "funny feeling", "sneaking into your backpack"];

/// Sender shown on the auto-message line.
pub const AUTO_MESSAGE_SENDER: &str = "Drop Bot";

const AUTO_MESSAGE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strips `<col=ff0000>`-style markup and swaps non-breaking spaces for
/// plain ones, so names compare the way they're displayed.
pub fn sanitize(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").replace('\u{00A0}', " ")
}

/// True if `text` contains any drop trigger phrase.
pub fn is_drop_broadcast(text: &str) -> bool {
    TRIGGER_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// Should this chat message be posted for `local_player`?
///
/// Requires a clan broadcast, a trigger phrase, and the sanitized player
/// name somewhere in the sanitized text.
pub fn should_notify(message: &ChatMessage, local_player: &str) -> bool {
    if message.kind != ChatMessageType::ClanMessage {
        return false;
    }
    if !is_drop_broadcast(&message.text) {
        return false;
    }

    let player = sanitize(local_player);
    if player.trim().is_empty() {
        return false;
    }

    sanitize(&message.text).contains(&player)
}

/// Builds the optional in-game reply: `[dd/mm/yyyy HH:mm:ss] <text>`.
/// Empty when the auto-message is off.
pub fn build_auto_message(config: &Config, now: &NaiveDateTime) -> String {
    if !config.auto_message_enabled {
        return String::new();
    }

    let mut parts: Vec<String> = Vec::with_capacity(2);
    if config.auto_message_date {
        parts.push(now.format(AUTO_MESSAGE_DATE_FORMAT).to_string());
    }
    if !config.auto_message.is_empty() {
        parts.push(config.auto_message.clone());
    }
    parts.join(" ")
}
