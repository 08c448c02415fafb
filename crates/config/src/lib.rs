//! Configuration loading, validation, and management for helperbot.
//!
//! Loads configuration from a `.env` file, then `helperbot.toml` (or the file
//! named by `HELPERBOT_CONFIG`), then environment variable overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which deployment profile the process runs under (`CONFIG` env var).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: testing bot token, long polling.
    #[default]
    Dev,
    /// Test runs.
    Test,
    /// Deployed service: production bot token, webhook delivery.
    Production,
}

impl Environment {
    /// Parse the `CONFIG` value. Anything unrecognised is production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Environment::Dev,
            "test" => Environment::Test,
            _ => Environment::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

/// The root configuration structure.
///
/// Maps directly to `helperbot.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment profile
    #[serde(default)]
    pub environment: Environment,

    /// API key for the hosted LLM endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model used for query embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature for the completion call
    #[serde(default)]
    pub temperature: f32,

    /// Token budgets
    #[serde(default)]
    pub budgets: BudgetConfig,

    /// Conversation cache policy
    #[serde(default)]
    pub cache: CacheConfig,

    /// Corpus location and passage labelling
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Prompt text
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("budgets", &self.budgets)
            .field("cache", &self.cache)
            .field("knowledge", &self.knowledge)
            .field("assistant", &self.assistant)
            .field("telegram", &self.telegram)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Token ceilings for the pieces of a single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Cached conversation turns
    #[serde(default = "default_history_budget")]
    pub history: usize,

    /// Stored plus current-query context passages
    #[serde(default = "default_context_budget")]
    pub context: usize,

    /// Ceiling for the current query's retrieved passages
    #[serde(default = "default_request_budget")]
    pub request: usize,
}

fn default_history_budget() -> usize {
    1500
}
fn default_context_budget() -> usize {
    2500
}
fn default_request_budget() -> usize {
    4096 - 500
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            history: default_history_budget(),
            context: default_context_budget(),
            request: default_request_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of conversations remembered per store
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,

    /// Lifetime of a conversation entry, counted from its creation
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_entries() -> usize {
    1024
}
fn default_cache_ttl() -> u64 {
    1800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// CSV file with `text` and `embedding` columns
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// Heading placed above each retrieved passage in the prompt
    #[serde(default = "default_section_label")]
    pub section_label: String,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.csv")
}
fn default_section_label() -> String {
    "A2SV section".into()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            section_label: default_section_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Fixed system instruction sent first on every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// User message template; `{contexts}` and `{query}` are substituted
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_system_prompt() -> String {
    "You are A2SV 2024 AI for Africa Hackathon Helper bot a telegram bot that answer questions \
     about the A2SV as well as the 2024 AI for Africa Hackathon A2SV has prepared, when replying \
     use emojis where necessary and also provide actual links when asked."
        .into()
}
fn default_prompt_template() -> String {
    "Use the below texts about A2SV and the Hackathon as well as conversation history as context \
     for answering questions. If the answer cannot be found in the articles, write \
     \"I could not find an answer.\"\n\n\
     Articles about A2SV and the Hackathon it has prepared:\n\
     {contexts}\n\n\
     Question: {query}"
        .into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            prompt_template: default_prompt_template(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default)]
    pub bot_token: String,

    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Public base URL the webhook is served under
    #[serde(default)]
    pub service_base_url: String,

    /// Sticker shown while an answer is being generated
    #[serde(default = "default_loading_sticker")]
    pub loading_sticker: String,

    /// Reply to `/start` (HTML)
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

fn default_bot_name() -> String {
    "A2SV Community Helper Bot".into()
}
fn default_loading_sticker() -> String {
    "CAACAgIAAxkBAANJZbzSkvelL5pyrfiyC3r5MiqIqhoAAiMAAygPahQnUSXnjCCkBjQE".into()
}
fn default_welcome_message() -> String {
    "🚀 Welcome to the <b>2024 A2SV AI for Africa Hackathon Helper Bot!</b>\n\n\
     We're thrilled to have you here! 🌍✨\n\n\
     <b>What can you do?</b>\n\n\
     <b>🔍 Explore A2SV:</b>\n\
     Learn more about A2SV, its mission, and find important links. Discover how we're \
     empowering African tech talent and fostering innovation.\n\n\
     <b>🔍 Explore the 2024 AI for Africa Hackathon:</b>\n\
     Learn more about the hackathon, its goals, and how you can participate. Find important \
     links and resources to help you get started."
        .into()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_name: default_bot_name(),
            service_base_url: String::new(),
            loading_sticker: default_loading_sticker(),
            welcome_message: default_welcome_message(),
        }
    }
}

impl TelegramConfig {
    /// The URL Telegram should deliver updates to.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/bot/{}",
            self.service_base_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("bot_name", &self.bot_name)
            .field("service_base_url", &self.service_base_url)
            .field("loading_sticker", &self.loading_sticker)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins; `["*"]` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration the way the service does at startup.
    ///
    /// 1. `.env` in the working directory (or a parent), if any
    /// 2. `$HELPERBOT_CONFIG` or `./helperbot.toml`, if present
    /// 3. Environment variable overrides (see [`AppConfig::apply_env`])
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => tracing::warn!("No .env file found, using process environment"),
            Err(e) => return Err(ConfigError::EnvFileError(e.to_string())),
        }

        let config_path = std::env::var("HELPERBOT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        tracing::info!(environment = config.environment.as_str(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        PathBuf::from("helperbot.toml")
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// - `CONFIG` selects the profile (`dev`, `test`, anything else = production)
    /// - `OPENAI_API_KEY`, `HELPERBOT_MODEL`, `HELPERBOT_CORPUS`
    /// - `BOT_TOKEN` (or `TESTING_BOT_TOKEN` in dev), `BOT_NAME`, `SERVICE_BASE_URL`
    /// - `PORT` (binds all interfaces, as container platforms expect)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(profile) = lookup("CONFIG") {
            self.environment = Environment::parse(&profile);
        }

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("HELPERBOT_MODEL") {
            self.model = model;
        }
        if let Some(path) = lookup("HELPERBOT_CORPUS") {
            self.knowledge.corpus_path = PathBuf::from(path);
        }

        let token_var = match self.environment {
            Environment::Dev => "TESTING_BOT_TOKEN",
            _ => "BOT_TOKEN",
        };
        if let Some(token) = lookup(token_var) {
            self.telegram.bot_token = token;
        }
        if let Some(name) = lookup("BOT_NAME") {
            self.telegram.bot_name = name;
        }
        if let Some(url) = lookup("SERVICE_BASE_URL") {
            self.telegram.service_base_url = url;
        }

        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
            self.gateway.host = "0.0.0.0".into();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be > 0".into(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be > 0".into(),
            ));
        }

        if !self.assistant.prompt_template.contains("{query}") {
            return Err(ConfigError::ValidationError(
                "assistant.prompt_template must contain {query}".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether updates should arrive by webhook rather than long polling.
    pub fn uses_webhook(&self) -> bool {
        self.environment == Environment::Production && !self.telegram.service_base_url.is_empty()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: 0.0,
            budgets: BudgetConfig::default(),
            cache: CacheConfig::default(),
            knowledge: KnowledgeConfig::default(),
            assistant: AssistantConfig::default(),
            telegram: TelegramConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to load .env file: {0}")]
    EnvFileError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
