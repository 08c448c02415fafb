//! Inbound chat handling: what the bot does with each message.
//!
//! - `/start` gets the welcome message
//! - anything without text gets a fixed "text only" reply
//! - everything else is answered: a loading sticker and a placeholder reply
//!   go out first, the placeholder is edited with the answer (or a generic
//!   failure message), then the sticker is removed
//!
//! Failures of the cosmetic steps are logged and never abort the answer.

use std::sync::Arc;

use helperbot_config::TelegramConfig;
use helperbot_core::assistant::Assistant;
use helperbot_core::channel::{Channel, ChannelMessage, SentMessage};
use helperbot_core::error::{ChannelError, PROCESSING_FAILED_MESSAGE};
use helperbot_core::message::ConversationId;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Reply to messages without text (stickers, photos, voice notes).
pub const TEXT_ONLY_MESSAGE: &str = "I can only process text messages! 📝";

/// Placeholder shown while an answer is being generated.
pub const PLACEHOLDER_MESSAGE: &str = "Give me some moments please ⏳...";

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Welcomed,
    RejectedNonText,
    Answered,
    Failed,
}

pub struct ChatHandler {
    channel: Arc<dyn Channel>,
    assistant: Arc<dyn Assistant>,
    welcome_message: String,
    loading_sticker: String,
}

impl ChatHandler {
    pub fn new(
        channel: Arc<dyn Channel>,
        assistant: Arc<dyn Assistant>,
        welcome_message: impl Into<String>,
        loading_sticker: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            assistant,
            welcome_message: welcome_message.into(),
            loading_sticker: loading_sticker.into(),
        }
    }

    pub fn from_config(
        channel: Arc<dyn Channel>,
        assistant: Arc<dyn Assistant>,
        config: &TelegramConfig,
    ) -> Self {
        Self::new(
            channel,
            assistant,
            config.welcome_message.clone(),
            config.loading_sticker.clone(),
        )
    }

    /// Handle one inbound message.
    ///
    /// Errors are returned only when the bot could not reply at all.
    pub async fn handle(&self, message: ChannelMessage) -> Result<Outcome, ChannelError> {
        let chat_id = message.chat_id.as_str();

        let Some(query) = message.text() else {
            debug!(chat_id, "Rejecting message without text");
            self.channel
                .send(chat_id, TEXT_ONLY_MESSAGE, Some(&message.message_id))
                .await?;
            return Ok(Outcome::RejectedNonText);
        };

        if is_start_command(query) {
            info!(chat_id, sender = ?message.sender_name, "Welcoming user");
            self.channel.send(chat_id, &self.welcome_message, None).await?;
            return Ok(Outcome::Welcomed);
        }

        let sticker = match self.channel.send_sticker(chat_id, &self.loading_sticker).await {
            Ok(sticker) => sticker,
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to send loading sticker");
                None
            }
        };

        let placeholder = match self
            .channel
            .send(chat_id, PLACEHOLDER_MESSAGE, Some(&message.message_id))
            .await
        {
            Ok(placeholder) => placeholder,
            Err(e) => {
                self.remove_sticker(chat_id, sticker).await;
                return Err(e);
            }
        };

        let id = ConversationId::new(chat_id);
        let (reply, outcome) = match self.assistant.ask(&id, query).await {
            Ok(answer) => (answer, Outcome::Answered),
            Err(e) => {
                error!(chat_id, error = %e, "Failed to answer question");
                (PROCESSING_FAILED_MESSAGE.to_string(), Outcome::Failed)
            }
        };

        if let Err(e) = self.channel.edit(&placeholder, &reply).await {
            error!(chat_id, error = %e, "Failed to deliver answer");
        }

        self.remove_sticker(chat_id, sticker).await;
        Ok(outcome)
    }

    async fn remove_sticker(&self, chat_id: &str, sticker: Option<SentMessage>) {
        if let Some(sticker) = sticker
            && let Err(e) = self.channel.delete(&sticker).await
        {
            warn!(chat_id, error = %e, "Failed to remove loading sticker");
        }
    }

    /// Drain a channel's inbound stream, handling each message in its own task.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<Result<ChannelMessage, ChannelError>>) {
        info!(channel = self.channel.name(), "Chat handler running");
        while let Some(item) = inbound.recv().await {
            match item {
                Ok(message) => {
                    let handler = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handler.handle(message).await {
                            error!(error = %e, "Failed to reply to message");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Channel reported an error"),
            }
        }
        info!("Inbound stream closed");
    }
}

/// `/start`, `/start@SomeBot` and `/start payload` all count.
pub fn is_start_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let command = first.split('@').next().unwrap_or(first);
    command == "/start"
}
