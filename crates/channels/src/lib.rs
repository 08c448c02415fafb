//! Chat channels for helperbot.
//!
//! - **Telegram**: Bot API client plus a [`Channel`](helperbot_core::Channel)
//!   adapter supporting long polling and webhook delivery
//! - **Handler**: the per-message flow shared by both delivery modes

pub mod handler;
pub mod telegram;

pub use handler::{ChatHandler, Outcome, PLACEHOLDER_MESSAGE, TEXT_ONLY_MESSAGE};
pub use telegram::{TelegramChannel, TelegramClient, bot_commands};
