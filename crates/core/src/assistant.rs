//! Assistant trait: what the inbound surfaces delegate to.
//!
//! Both the chat transport and the HTTP API hand a (conversation, question)
//! pair to an `Assistant` and render whatever comes back. Keeping this as a
//! trait lets the surfaces be tested without an orchestrator behind them.

use async_trait::async_trait;
use crate::error::Result;
use crate::message::ConversationId;

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Answer `query` in the context of conversation `id`.
    async fn ask(&self, id: &ConversationId, query: &str) -> Result<String>;
}
