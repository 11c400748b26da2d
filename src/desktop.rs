//! Desktop host: runs the notifier without a game client.
//!
//! Chat lines come from stdin (`CLAN_MESSAGE: ...`, or a bare line), frames
//! come from the primary monitor, and the player name and chat box
//! rectangle come from the config file. `:reload` re-reads the config.

use crate::capture::{capture_primary_monitor, Rect};
use crate::config::{Config, WEBHOOK_KEY};
use crate::host::{ChatMessage, ChatMessageType, ClientEvent, FrameSource, GameClient};
use crate::notifier::DropNotifier;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

pub const RELOAD_COMMAND: &str = ":reload";

const EVENT_QUEUE_DEPTH: usize = 64;

struct DesktopProfile {
    player_name: Option<String>,
    chatbox: Option<Rect>,
}

/// `GameClient` backed by config values and stdout.
pub struct DesktopClient {
    profile: Mutex<DesktopProfile>,
    stretched: AtomicBool,
}

impl DesktopClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            profile: Mutex::new(DesktopProfile {
                player_name: config.player_name.clone(),
                chatbox: config.chatbox,
            }),
            stretched: AtomicBool::new(false),
        }
    }

    pub fn apply_config(&self, config: &Config) {
        let mut profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.player_name = config.player_name.clone();
        profile.chatbox = config.chatbox;
    }
}

impl GameClient for DesktopClient {
    fn local_player_name(&self) -> Option<String> {
        let profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.player_name.clone()
    }

    fn chatbox_bounds(&self) -> Option<Rect> {
        let profile = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        profile.chatbox
    }

    fn is_stretched_enabled(&self) -> bool {
        self.stretched.load(Ordering::SeqCst)
    }

    fn set_stretched_enabled(&self, enabled: bool) {
        self.stretched.store(enabled, Ordering::SeqCst);
    }

    fn add_chat_message(&self, kind: ChatMessageType, sender: &str, text: &str) {
        log::info!("[CLIENT] {:?} from '{}': {}", kind, sender, text);
        if sender.is_empty() {
            println!("{}", text);
        } else {
            println!("{}: {}", sender, text);
        }
    }
}

/// Grabs the primary monitor on a blocking thread for each request.
pub struct MonitorFrameSource;

impl FrameSource for MonitorFrameSource {
    fn request_next_frame(&self) -> oneshot::Receiver<DynamicImage> {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let start = std::time::Instant::now();
            match capture_primary_monitor() {
                Ok(frame) => {
                    log::info!("[CAPTURE] Screen captured in {}ms", start.elapsed().as_millis());
                    let _ = tx.send(frame);
                }
                // Dropping `tx` tells the waiting drop there is no frame.
                Err(e) => log::error!("[CAPTURE] {}", e),
            }
        });
        rx
    }
}

/// Turns input lines into client events until EOF or until the notifier
/// stops listening.
pub async fn read_chat_lines<R>(
    reader: R,
    config_path: PathBuf,
    client: Arc<DesktopClient>,
    events: mpsc::Sender<ClientEvent>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = if line == RELOAD_COMMAND {
            match Config::load(&config_path) {
                Ok(config) => {
                    log::info!("[CONFIG] Reloaded {}", config_path.display());
                    client.apply_config(&config);
                    ClientEvent::ConfigChanged {
                        key: WEBHOOK_KEY.to_string(),
                        config,
                    }
                }
                Err(e) => {
                    log::error!("[CONFIG] Reload failed: {}", e);
                    continue;
                }
            }
        } else {
            ClientEvent::Chat(ChatMessage::parse_line(line))
        };

        if events.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Wires stdin, the monitor, and the notifier together and runs until
/// stdin closes.
pub async fn run_desktop(config: Config, config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(DesktopClient::from_config(&config));
    if config.player_name.is_none() {
        log::warn!("[CONFIG] No player_name set; no drop will match");
    }

    let notifier = DropNotifier::new(client.clone(), Arc::new(MonitorFrameSource), config);
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    let reader = tokio::spawn(read_chat_lines(
        BufReader::new(tokio::io::stdin()),
        config_path,
        client,
        tx,
    ));

    notifier.run(rx).await;
    reader.await??;
    Ok(())
}
