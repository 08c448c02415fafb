//! `helperbot poll`: Run the bot with long polling (no public URL needed).

use std::sync::Arc;

use helperbot_channels::{ChatHandler, TelegramChannel};
use helperbot_core::channel::Channel;
use helperbot_memory::SWEEP_INTERVAL;
use tracing::{info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    if config.telegram.bot_token.is_empty() {
        return Err("No bot token configured. Set BOT_TOKEN (or TESTING_BOT_TOKEN with CONFIG=dev).".into());
    }

    let orchestrator = super::build_orchestrator(&config)?;
    let sweeper = orchestrator.cache().clone().spawn_sweeper(SWEEP_INTERVAL);
    let channel = Arc::new(TelegramChannel::from_config(&config.telegram));

    if let Err(e) = channel.register_commands().await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let inbound = channel
        .start()
        .await
        .map_err(|e| format!("Channel error: {e}"))?;
    let handler = Arc::new(ChatHandler::from_config(
        channel.clone(),
        orchestrator,
        &config.telegram,
    ));

    println!("Helperbot polling Telegram. Press Ctrl+C to stop.");

    tokio::select! {
        _ = handler.run(inbound) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down the bot");
        }
    }

    sweeper.abort();
    channel.stop().await?;
    Ok(())
}
