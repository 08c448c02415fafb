//! LLM provider implementations for helperbot.
//!
//! All providers implement the `helperbot_core::Provider` trait.

pub mod openai_compat;

use std::sync::Arc;

use helperbot_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the provider described by configuration.
pub fn build_from_config(config: &helperbot_config::AppConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("No API key configured; completion and embedding calls will be rejected");
    }
    Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key))
}
