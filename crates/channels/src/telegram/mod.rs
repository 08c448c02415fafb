//! Telegram channel adapter.
//!
//! Two ways in:
//! - **Long polling**: [`Channel::start`] drops any webhook and spawns a
//!   `getUpdates` loop that feeds the returned receiver.
//! - **Webhook**: the HTTP gateway hands each posted update to
//!   [`TelegramChannel::parse_update`] and dispatches the result itself.

pub mod api;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use helperbot_config::TelegramConfig;
use helperbot_core::channel::{Channel, ChannelId, ChannelMessage, SentMessage};
use helperbot_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub use api::{BotCommand, TelegramClient, Update, WebhookInfo};

/// Long-poll timeout passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u64 = 2;

/// Pause after a failed poll before trying again.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// The commands advertised in the Telegram client's menu.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![BotCommand::new(
        "start",
        "Start the A2SV 2024 AI for Africa Hackathon Helper Bot!",
    )]
}

pub struct TelegramChannel {
    client: TelegramClient,
    channel_id: ChannelId,
    poll_timeout_secs: u64,
    polling: Arc<AtomicBool>,
    offset: Arc<AtomicI64>,
}

impl TelegramChannel {
    pub fn new(client: TelegramClient) -> Self {
        Self {
            client,
            channel_id: ChannelId("telegram".into()),
            poll_timeout_secs: POLL_TIMEOUT_SECS,
            polling: Arc::new(AtomicBool::new(false)),
            offset: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(TelegramClient::new(config.bot_token.clone()))
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }

    /// The id of the last update seen by the polling loop.
    pub fn last_update_id(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Decode a webhook body into a message. Updates without a message
    /// (edits, callbacks, member changes) yield `None`.
    pub fn parse_update(body: &[u8]) -> Result<Option<ChannelMessage>, ChannelError> {
        let update: Update = serde_json::from_slice(body)
            .map_err(|e| ChannelError::InvalidPayload(e.to_string()))?;
        Ok(message_from_update(update))
    }

    /// Register the bot's command menu.
    pub async fn register_commands(&self) -> Result<(), ChannelError> {
        let commands = bot_commands();
        self.client.set_my_commands(&commands).await?;
        info!(count = commands.len(), "Registered bot commands");
        Ok(())
    }

    /// Point Telegram at `url` unless it already is. Returns whether the
    /// webhook was changed.
    pub async fn ensure_webhook(&self, url: &str) -> Result<bool, ChannelError> {
        let current = self.client.get_webhook_info().await?;
        debug!(pending = current.pending_update_count, "Fetched webhook info");
        if current.url == url {
            info!("Webhook already up to date");
            return Ok(false);
        }
        self.client.set_webhook(url).await?;
        info!("Webhook updated");
        Ok(true)
    }
}

/// Convert a Bot API update into a channel message.
pub fn message_from_update(update: Update) -> Option<ChannelMessage> {
    let message = update.message?;
    Some(ChannelMessage {
        channel_id: ChannelId("telegram".into()),
        chat_id: message.chat.id.to_string(),
        message_id: message.message_id.to_string(),
        sender_id: message.from.as_ref().map(|u| u.id.to_string()),
        sender_name: message.from.as_ref().and_then(|u| u.display_name()),
        text: message.text,
    })
}

fn parse_message_id(id: &str) -> Result<i64, ChannelError> {
    id.parse()
        .map_err(|_| ChannelError::InvalidPayload(format!("not a Telegram message id: {id}")))
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.polling.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::NotConfigured("Telegram polling already running".into()));
        }
        if let Err(e) = self.client.delete_webhook().await {
            self.polling.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let polling = self.polling.clone();
        let offset = self.offset.clone();
        let timeout = self.poll_timeout_secs;

        tokio::spawn(async move {
            info!(timeout_secs = timeout, "Telegram polling started");
            while polling.load(Ordering::SeqCst) {
                let last = offset.load(Ordering::SeqCst);
                let next = if last > 0 { last + 1 } else { 0 };

                let updates = match client.get_updates(next, timeout).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        error!(error = %e, "Telegram polling failed");
                        tokio::time::sleep(POLL_BACKOFF).await;
                        continue;
                    }
                };

                for update in updates {
                    offset.store(update.update_id, Ordering::SeqCst);
                    let Some(message) = message_from_update(update) else {
                        continue;
                    };
                    if tx.send(Ok(message)).await.is_err() {
                        warn!("Message receiver dropped, stopping polling");
                        polling.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
            info!("Telegram polling stopped");
        });

        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<SentMessage, ChannelError> {
        let reply_to = reply_to.map(parse_message_id).transpose()?;
        let sent = self.client.send_message(chat_id, content, reply_to).await?;
        Ok(SentMessage {
            chat_id: sent.chat.id.to_string(),
            message_id: sent.message_id.to_string(),
        })
    }

    async fn edit(&self, message: &SentMessage, content: &str) -> Result<(), ChannelError> {
        let id = parse_message_id(&message.message_id)?;
        self.client.edit_message_text(&message.chat_id, id, content).await
    }

    async fn delete(&self, message: &SentMessage) -> Result<(), ChannelError> {
        let id = parse_message_id(&message.message_id)?;
        self.client.delete_message(&message.chat_id, id).await?;
        Ok(())
    }

    async fn send_sticker(
        &self,
        chat_id: &str,
        sticker: &str,
    ) -> Result<Option<SentMessage>, ChannelError> {
        let sent = self.client.send_sticker(chat_id, sticker).await?;
        Ok(Some(SentMessage {
            chat_id: sent.chat.id.to_string(),
            message_id: sent.message_id.to_string(),
        }))
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        self.polling.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.client.get_me().await.is_ok())
    }
}
