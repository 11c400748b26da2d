//! Game client seam: the events we consume and the calls we make back.
//!
//! The notifier never talks to a renderer or widget tree directly. A host
//! (the real game client, the desktop host, or a test double) implements
//! these traits and feeds `ClientEvent`s into the notifier's channel.

use crate::capture::Rect;
use crate::config::Config;
use image::DynamicImage;
use tokio::sync::oneshot;

/// Chat channel a message arrived on. Only clan broadcasts matter to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    ClanMessage,
    GameMessage,
    PublicChat,
    Other,
}

impl ChatMessageType {
    /// Parses the host's channel name, e.g. `CLAN_MESSAGE`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "CLAN_MESSAGE" => Self::ClanMessage,
            "GAMEMESSAGE" | "GAME_MESSAGE" => Self::GameMessage,
            "PUBLICCHAT" | "PUBLIC_CHAT" => Self::PublicChat,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: ChatMessageType,
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn clan(text: impl Into<String>) -> Self {
        Self {
            kind: ChatMessageType::ClanMessage,
            sender: String::new(),
            text: text.into(),
        }
    }

    /// Parses a `TYPE: text` line. A line without a known type prefix is
    /// treated as a clan broadcast.
    pub fn parse_line(line: &str) -> Self {
        if let Some((prefix, rest)) = line.split_once(':') {
            let kind = ChatMessageType::from_name(prefix);
            if kind != ChatMessageType::Other || is_channel_name(prefix) {
                return Self {
                    kind,
                    sender: String::new(),
                    text: rest.trim_start().to_string(),
                };
            }
        }
        Self::clan(line)
    }
}

fn is_channel_name(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Inbound events, in the order the host emits them.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Chat(ChatMessage),
    ConfigChanged { key: String, config: Config },
}

/// Calls back into the game client.
pub trait GameClient: Send + Sync {
    fn local_player_name(&self) -> Option<String>;

    /// Bounding rectangle of the chat box widget in frame coordinates.
    fn chatbox_bounds(&self) -> Option<Rect>;

    fn is_stretched_enabled(&self) -> bool;

    fn set_stretched_enabled(&self, enabled: bool);

    /// Shows a line in the client's own chat box.
    fn add_chat_message(&self, kind: ChatMessageType, sender: &str, text: &str);
}

/// Delivers the next rendered frame, once.
pub trait FrameSource: Send + Sync {
    /// Registers a one-shot listener for the next frame. The receiver errors
    /// if the source gives up without rendering.
    fn request_next_frame(&self) -> oneshot::Receiver<DynamicImage>;
}
