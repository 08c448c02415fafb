//! `helperbot ask`: One question through the full answer pipeline.

use helperbot_config::AppConfig;
use helperbot_core::assistant::Assistant;
use helperbot_core::message::ConversationId;

pub async fn run(conversation: &str, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set OPENAI_API_KEY, or add api_key to your config file:");
        eprintln!("    {}", AppConfig::default_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let orchestrator = super::build_orchestrator(&config)?;

    eprint!("  Thinking...");
    let answer = orchestrator
        .ask(&ConversationId::new(conversation), question)
        .await;
    eprint!("\r              \r");

    match answer {
        Ok(answer) => {
            println!("{answer}");
            Ok(())
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            Err(e.user_message().into())
        }
    }
}
