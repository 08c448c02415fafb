pub mod ask;
pub mod check_config;
pub mod poll;
pub mod serve;

use std::sync::Arc;

use helperbot_agent::AnswerOrchestrator;
use helperbot_config::AppConfig;
use helperbot_memory::Corpus;

/// Load configuration, reporting failures in the CLI's voice.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Load the corpus and wire the orchestrator to the configured provider.
pub fn build_orchestrator(
    config: &AppConfig,
) -> Result<Arc<AnswerOrchestrator>, Box<dyn std::error::Error>> {
    let corpus = Corpus::load(&config.knowledge.corpus_path)
        .map_err(|e| format!("Failed to load corpus: {e}"))?;
    let provider = helperbot_providers::build_from_config(config);
    let orchestrator = AnswerOrchestrator::from_config(config, provider, Arc::new(corpus))?;
    Ok(Arc::new(orchestrator))
}
