//! The drop pipeline: consumes client events and posts matching drops.
//!
//! One loop owns the event stream. Per drop it either posts text straight
//! away or asks the frame source for the next frame and hands the rest
//! (crop, PNG, disk, upload) to a spawned task. Drops never wait on each
//! other and nothing is retried.

use crate::capture::{self, CaptureError, StretchGuard, StretchSuspender};
use crate::config::{Config, WEBHOOK_KEY};
use crate::host::{ChatMessage, ChatMessageType, ClientEvent, FrameSource, GameClient};
use crate::notify::{self, AUTO_MESSAGE_SENDER};
use crate::persist::{PersistError, PersistedScreenshot, ScreenshotStore, BASE_NAME, SUB_DIR};
use crate::webhook::{self, WebhookDispatcher, WebhookMessage, ATTACHMENT_IMAGE_URL};
use chrono::Local;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Shown in the game chat when the configured webhook fails validation.
pub const INVALID_WEBHOOK_MESSAGE: &str = "Clan notification webhook is invalid or unreachable";

pub struct DropNotifier {
    client: Arc<dyn GameClient>,
    frames: Arc<dyn FrameSource>,
    stretch: Arc<StretchSuspender>,
    config: RwLock<Arc<Config>>,
    webhook_valid: AtomicBool,
    http: reqwest::Client,
    dispatcher: WebhookDispatcher,
}

impl DropNotifier {
    pub fn new(client: Arc<dyn GameClient>, frames: Arc<dyn FrameSource>, config: Config) -> Self {
        Self::with_http_client(client, frames, config, reqwest::Client::new())
    }

    pub fn with_http_client(
        client: Arc<dyn GameClient>,
        frames: Arc<dyn FrameSource>,
        config: Config,
        http: reqwest::Client,
    ) -> Self {
        Self {
            stretch: StretchSuspender::new(Arc::clone(&client)),
            client,
            frames,
            config: RwLock::new(Arc::new(config)),
            webhook_valid: AtomicBool::new(false),
            dispatcher: WebhookDispatcher::new(http.clone()),
            http,
        }
    }

    /// Snapshot of the current config. Later changes don't affect it.
    pub fn config(&self) -> Arc<Config> {
        let guard = self.config.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Verdict of the most recent validation. False until one has run.
    pub fn is_webhook_valid(&self) -> bool {
        self.webhook_valid.load(Ordering::SeqCst)
    }

    /// Probes the configured webhook and caches the verdict.
    pub async fn revalidate(&self) -> bool {
        let config = self.config();
        let timeout = Duration::from_secs(config.validation_timeout_secs);
        let valid = webhook::validate(&self.http, &config.webhook, timeout).await;
        self.webhook_valid.store(valid, Ordering::SeqCst);
        log::info!("[NOTIFIER] Webhook valid: {}", valid);
        valid
    }

    async fn revalidate_and_announce(&self) -> bool {
        let valid = self.revalidate().await;
        if !valid {
            self.client
                .add_chat_message(ChatMessageType::GameMessage, "", INVALID_WEBHOOK_MESSAGE);
        }
        valid
    }

    /// Consumes events until every sender is gone, then waits for
    /// in-flight drops to finish.
    pub async fn run(&self, mut events: mpsc::Receiver<ClientEvent>) {
        log::info!("[NOTIFIER] Listening for clan drops");
        self.revalidate_and_announce().await;

        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        while let Some(event) = events.recv().await {
            if let Some(handle) = self.handle_event(event).await {
                in_flight.retain(|h| !h.is_finished());
                in_flight.push(handle);
            }
        }

        log::info!(
            "[NOTIFIER] Event channel closed, waiting on {} drop(s)",
            in_flight.len()
        );
        for handle in in_flight {
            let _ = handle.await;
        }
    }

    pub async fn handle_event(&self, event: ClientEvent) -> Option<JoinHandle<()>> {
        match event {
            ClientEvent::Chat(message) => self.handle_chat(&message),
            ClientEvent::ConfigChanged { key, config } => {
                self.handle_config_changed(&key, config).await;
                None
            }
        }
    }

    /// Swaps in the new config. A webhook change is revalidated inline,
    /// which holds up the event loop for the length of the probe.
    pub async fn handle_config_changed(&self, key: &str, config: Config) {
        {
            let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::new(config);
        }
        log::debug!("[NOTIFIER] Config changed: {}", key);

        if key == WEBHOOK_KEY {
            self.revalidate_and_announce().await;
        }
    }

    /// Posts `message` if it is a clan drop for the local player.
    ///
    /// Returns the handle of the spawned post, or `None` when nothing was
    /// sent. Must be called from inside a tokio runtime.
    pub fn handle_chat(&self, message: &ChatMessage) -> Option<JoinHandle<()>> {
        let player = self.client.local_player_name()?;
        if !notify::should_notify(message, &player) {
            return None;
        }

        let config = self.config();
        log::info!("[NOTIFIER] Drop detected for {}", player);

        let auto_message = notify::build_auto_message(&config, &Local::now().naive_local());
        if !auto_message.is_empty() {
            self.client
                .add_chat_message(ChatMessageType::GameMessage, AUTO_MESSAGE_SENDER, &auto_message);
        }

        if !self.is_webhook_valid() {
            log::warn!("[NOTIFIER] Webhook is invalid or unreachable, drop not posted");
            return None;
        }

        let content = message.text.clone();
        if config.screenshot {
            Some(self.post_with_screenshot(config, content, player))
        } else {
            Some(
                self.dispatcher
                    .dispatch(&config.webhook, WebhookMessage::text(content), None),
            )
        }
    }

    fn post_with_screenshot(&self, config: Arc<Config>, content: String, player: String) -> JoinHandle<()> {
        // Off before the frame is drawn so widget bounds match raw pixels.
        let stretch = if config.only_chat {
            self.stretch.suspend()
        } else {
            StretchGuard::inactive()
        };
        let next_frame = self.frames.request_next_frame();
        let client = Arc::clone(&self.client);
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let saved = match capture_and_persist(client, next_frame, stretch, &config, player).await {
                Ok(saved) => saved,
                Err(e) => {
                    log::warn!("[NOTIFIER] Screenshot failed, drop not posted: {}", e);
                    return;
                }
            };

            let mut message = WebhookMessage::text(content);
            if config.embed_screenshot {
                message = message.with_image_url(ATTACHMENT_IMAGE_URL);
            }

            if let Err(e) = dispatcher
                .send(&config.webhook, &message, Some(saved.png_bytes))
                .await
            {
                log::debug!("[WEBHOOK] Error submitting webhook: {}", e);
            }
        })
    }
}

/// Waits for the frame, then crops, encodes and writes it on a blocking
/// worker. `stretch` is released right after the crop, or on whichever
/// early return comes first.
async fn capture_and_persist(
    client: Arc<dyn GameClient>,
    next_frame: oneshot::Receiver<DynamicImage>,
    stretch: StretchGuard,
    config: &Config,
    player: String,
) -> Result<PersistedScreenshot, PipelineError> {
    let frame = next_frame.await.map_err(|_| CaptureError::FrameDropped)?;

    let only_chat = config.only_chat;
    let store = ScreenshotStore::new(config.screenshots_root());
    let now = Local::now().naive_local();

    let saved = tokio::task::spawn_blocking(move || -> Result<PersistedScreenshot, PipelineError> {
        let bounds = if only_chat {
            Some(client.chatbox_bounds().ok_or(CaptureError::ChatboxUnavailable)?)
        } else {
            None
        };
        let captured = capture::capture(frame, bounds);
        drop(stretch);

        let captured = captured?;
        Ok(store.persist(&captured.image, BASE_NAME, Some(SUB_DIR), Some(player.as_str()), &now)?)
    })
    .await??;

    Ok(saved)
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Screenshot worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
