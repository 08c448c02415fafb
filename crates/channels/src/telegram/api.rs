//! Minimal Telegram Bot API client.
//!
//! Every method is a JSON `POST` to `{base}/bot{token}/{method}` and every
//! response is wrapped in `{"ok": bool, "result": ..., "description": ...}`.
//! Transport errors are stripped of their URL before they are reported,
//! since the URL carries the bot token.

use std::time::Duration;

use helperbot_core::error::ChannelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Timeout for ordinary API calls.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse mode applied to every outgoing text.
pub const PARSE_MODE: &str = "HTML";

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, TELEGRAM_API_BASE)
    }

    /// Point the client at a different API host (tests, local Bot API servers).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T, ChannelError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !self.is_configured() {
            return Err(ChannelError::NotConfigured("Telegram bot token is empty".into()));
        }

        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() || e.is_connect() {
                    ChannelError::ConnectionLost(format!("{method}: {e}"))
                } else {
                    delivery_failed(method, e.to_string())
                }
            })?;

        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            ChannelError::InvalidPayload(format!("{method} (HTTP {status}): {}", e.without_url()))
        })?;

        if !body.ok {
            let description = body.description.unwrap_or_else(|| format!("HTTP {status}"));
            warn!(method, %status, description = %description, "Telegram API call rejected");
            return Err(delivery_failed(method, description));
        }

        debug!(method, "Telegram API call succeeded");
        body.result
            .ok_or_else(|| ChannelError::InvalidPayload(format!("{method}: ok without result")))
    }

    /// `getMe`: the bot's own account.
    pub async fn get_me(&self) -> Result<User, ChannelError> {
        self.call("getMe", &serde_json::json!({}), API_TIMEOUT).await
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, ChannelError> {
        self.call("getWebhookInfo", &serde_json::json!({}), API_TIMEOUT)
            .await
    }

    pub async fn set_webhook(&self, url: &str) -> Result<bool, ChannelError> {
        self.call("setWebhook", &serde_json::json!({ "url": url }), API_TIMEOUT)
            .await
    }

    pub async fn delete_webhook(&self) -> Result<bool, ChannelError> {
        self.call("deleteWebhook", &serde_json::json!({}), API_TIMEOUT)
            .await
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<bool, ChannelError> {
        self.call(
            "setMyCommands",
            &serde_json::json!({ "commands": commands }),
            API_TIMEOUT,
        )
        .await
    }

    /// Long-poll for updates after `offset`. The HTTP timeout is padded past
    /// the poll timeout so the server answers first.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ChannelError> {
        let params = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        self.call(
            "getUpdates",
            &params,
            Duration::from_secs(timeout_secs) + API_TIMEOUT,
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<Message, ChannelError> {
        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": PARSE_MODE,
        });
        if let Some(id) = reply_to_message_id {
            params["reply_to_message_id"] = id.into();
        }
        self.call("sendMessage", &params, API_TIMEOUT).await
    }

    pub async fn send_sticker(&self, chat_id: &str, sticker: &str) -> Result<Message, ChannelError> {
        let params = serde_json::json!({ "chat_id": chat_id, "sticker": sticker });
        self.call("sendSticker", &params, API_TIMEOUT).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), ChannelError> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": PARSE_MODE,
        });
        // The result is the edited Message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", &params, API_TIMEOUT).await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: &str, message_id: i64) -> Result<bool, ChannelError> {
        let params = serde_json::json!({ "chat_id": chat_id, "message_id": message_id });
        self.call("deleteMessage", &params, API_TIMEOUT).await
    }
}

fn delivery_failed(method: &str, reason: impl Into<String>) -> ChannelError {
    ChannelError::DeliveryFailed {
        channel: format!("telegram/{method}"),
        reason: reason.into(),
    }
}

// ── Bot API types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// `@username` if set, otherwise the full name.
    pub fn display_name(&self) -> Option<String> {
        if let Some(username) = &self.username {
            return Some(username.clone());
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        (!full.is_empty()).then_some(full)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pending_update_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}
