//! `helperbot check-config`: Show the effective configuration.

use helperbot_channels::TelegramChannel;
use helperbot_core::channel::Channel;
use helperbot_core::provider::Provider;
use helperbot_memory::Corpus;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Helperbot configuration check");
    println!("=============================\n");

    let config = super::load_config()?;
    println!("  {config:#?}\n");

    let mut issues = 0;

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key configured. Set OPENAI_API_KEY");
        issues += 1;
    }

    if config.telegram.bot_token.is_empty() {
        println!("  ⚠️  No bot token configured. Telegram is disabled");
        issues += 1;
    } else {
        println!("  ✅ Bot token configured (@{})", config.telegram.bot_name);
    }

    if config.uses_webhook() {
        println!("  ✅ Webhook delivery via {}", config.telegram.service_base_url);
    } else {
        println!("  ℹ️  Long polling (environment: {})", config.environment.as_str());
    }

    match Corpus::load(&config.knowledge.corpus_path) {
        Ok(corpus) => println!(
            "  ✅ Corpus: {} passages, dimension {}",
            corpus.len(),
            corpus.dimension().unwrap_or(0)
        ),
        Err(e) => {
            println!("  ❌ Corpus: {e}");
            issues += 1;
        }
    }

    let provider = helperbot_providers::build_from_config(&config);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ LLM endpoint reachable ({})", config.api_url),
        Ok(false) => {
            println!("  ⚠️  LLM endpoint rejected the request ({})", config.api_url);
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ LLM endpoint: {e}");
            issues += 1;
        }
    }

    if !config.telegram.bot_token.is_empty() {
        let channel = TelegramChannel::from_config(&config.telegram);
        match channel.health_check().await {
            Ok(true) => println!("  ✅ Telegram Bot API reachable"),
            Ok(_) => {
                println!("  ⚠️  Telegram rejected the bot token");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Telegram: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found.");
    }

    Ok(())
}
