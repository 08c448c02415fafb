//! Answer orchestration: one question in, one answer out.
//!
//! # Flow
//!
//! 1. Trim the conversation's cached turns to the history budget
//! 2. Build the current query's contexts against the request budget
//! 3. Trim the stored contexts to what the context budget leaves after the
//!    current ones, then append the current ones
//! 4. Send system prompt + history + the filled prompt template
//! 5. On success record the question and answer as turns
//!
//! A failed completion call is logged and surfaces as
//! [`AnswerError::Generation`]; the cache is left as it was.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use helperbot_config::{AppConfig, BudgetConfig};
use helperbot_core::assistant::Assistant;
use helperbot_core::error::{AnswerError, Result, TokenizerError};
use helperbot_core::message::{ContextPassage, ConversationId, Turn};
use helperbot_core::provider::{Provider, ProviderRequest};
use helperbot_memory::{ConversationCache, Corpus, RelevanceRanker};
use tracing::{debug, error, info};

use crate::context::{ContextAssembler, TokenCounter, join_passages, trim_passages, trim_turns};

/// The knobs the orchestrator needs, lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub budgets: BudgetConfig,
    pub section_label: String,
    pub system_prompt: String,
    pub prompt_template: String,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            budgets: config.budgets.clone(),
            section_label: config.knowledge.section_label.clone(),
            system_prompt: config.assistant.system_prompt.clone(),
            prompt_template: config.assistant.prompt_template.clone(),
        }
    }
}

/// Answers questions using retrieved context and per-conversation history.
pub struct AnswerOrchestrator {
    provider: Arc<dyn Provider>,
    assembler: ContextAssembler,
    cache: Arc<ConversationCache>,
    counter: TokenCounter,
    settings: OrchestratorSettings,
}

impl AnswerOrchestrator {
    /// Fails if the configured model has no known token encoding.
    pub fn new(
        provider: Arc<dyn Provider>,
        corpus: Arc<Corpus>,
        cache: Arc<ConversationCache>,
        settings: OrchestratorSettings,
    ) -> std::result::Result<Self, TokenizerError> {
        let counter = TokenCounter::for_model(&settings.model)?;
        let ranker = RelevanceRanker::new(provider.clone(), settings.embedding_model.clone());
        let assembler = ContextAssembler::new(
            ranker,
            corpus,
            counter.clone(),
            settings.section_label.clone(),
        );
        Ok(Self {
            provider,
            assembler,
            cache,
            counter,
            settings,
        })
    }

    /// Build from application config with a fresh conversation cache.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        corpus: Arc<Corpus>,
    ) -> std::result::Result<Self, TokenizerError> {
        let cache = Arc::new(ConversationCache::new(
            config.cache.max_entries,
            config.cache.ttl(),
        ));
        Self::new(provider, corpus, cache, OrchestratorSettings::from_config(config))
    }

    pub fn cache(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    /// Answer `query` within conversation `id`.
    pub async fn answer(&self, id: &ConversationId, query: &str) -> Result<String> {
        let budgets = &self.settings.budgets;

        let turns_handle = self.cache.turns(id);
        let history = {
            let mut turns = lock(&turns_handle);
            trim_turns(&mut turns, budgets.history, &self.counter);
            turns.clone()
        };

        let contexts_handle = self.cache.contexts(id);
        let current = self.assembler.build(query, budgets.request).await?;
        let reserved = self.counter.count(&join_passages(&current));
        let remaining = budgets.context.saturating_sub(reserved);

        let mut contexts: Vec<ContextPassage> = lock(&contexts_handle).clone();
        trim_passages(&mut contexts, remaining, &self.counter);
        contexts.extend(current.iter().cloned());

        info!(
            conversation = %id,
            history = history.len(),
            contexts = contexts.len(),
            current = current.len(),
            "Answering question"
        );

        let content = render_prompt(
            &self.settings.prompt_template,
            &join_passages(&contexts),
            query,
        );
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Turn::system(self.settings.system_prompt.clone()));
        messages.extend(history);
        messages.push(Turn::user(content));

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: None,
        };

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    conversation = %id,
                    provider = self.provider.name(),
                    error = %e,
                    "Completion call failed"
                );
                return Err(AnswerError::Generation(e).into());
            }
        };

        let answer = response.message.content;
        *lock(&contexts_handle) = contexts;
        lock(&turns_handle).extend([Turn::user(query), Turn::assistant(answer.clone())]);

        if let Some(usage) = &response.usage {
            debug!(
                conversation = %id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        Ok(answer)
    }
}

#[async_trait]
impl Assistant for AnswerOrchestrator {
    async fn ask(&self, id: &ConversationId, query: &str) -> Result<String> {
        self.answer(id, query).await
    }
}

/// Fill `{contexts}` and `{query}` in one pass, so neither value is
/// re-scanned for placeholders.
pub fn render_prompt(template: &str, contexts: &str, query: &str) -> String {
    let mut out = String::with_capacity(template.len() + contexts.len() + query.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{contexts}") {
            out.push_str(contexts);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{query}") {
            out.push_str(query);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, hackathon_corpus};
    use helperbot_core::error::{ANSWER_FAILED_MESSAGE, Error, ProviderError, RetrievalError};
    use helperbot_core::message::Role;
    use std::time::Duration;

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings::from_config(&AppConfig::default())
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        settings: OrchestratorSettings,
    ) -> AnswerOrchestrator {
        let cache = Arc::new(ConversationCache::new(16, Duration::from_secs(1800)));
        AnswerOrchestrator::new(provider, Arc::new(hackathon_corpus()), cache, settings).unwrap()
    }

    fn hackathon_provider() -> ScriptedProvider {
        ScriptedProvider::new(vec![0.1, 0.9])
    }

    #[tokio::test]
    async fn answer_is_recorded_as_turns() {
        let provider = Arc::new(hackathon_provider().reply("It starts in May 🎉"));
        let bot = orchestrator(provider.clone(), settings());
        let id = ConversationId::from(7_i64);

        let answer = bot.answer(&id, "when does the hackathon start").await.unwrap();
        assert_eq!(answer, "It starts in May 🎉");

        let turns = bot.cache().turns(&id).lock().unwrap().clone();
        assert_eq!(
            turns,
            vec![
                Turn::user("when does the hackathon start"),
                Turn::assistant("It starts in May 🎉"),
            ]
        );
        let contexts = bot.cache().contexts(&id).lock().unwrap().clone();
        assert_eq!(contexts[0].text, "Hackathon starts in May");
    }

    #[tokio::test]
    async fn request_has_system_history_and_prompt() {
        let provider = Arc::new(hackathon_provider().reply("first").reply("second"));
        let bot = orchestrator(provider.clone(), settings());
        let id = ConversationId::from("chat");

        bot.answer(&id, "what is A2SV").await.unwrap();
        bot.answer(&id, "when does the hackathon start").await.unwrap();

        let request = provider.last_request();
        assert_eq!(request.model, "gpt-3.5-turbo");
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, settings().system_prompt);
        assert_eq!(request.messages[1], Turn::user("what is A2SV"));
        assert_eq!(request.messages[2], Turn::assistant("first"));

        let prompt = &request.messages[3];
        assert_eq!(prompt.role, Role::User);
        assert!(prompt.content.contains("Question: when does the hackathon start"));
        assert!(prompt.content.contains("A2SV section:\n\"\"\"\nHackathon starts in May\n\"\"\""));
        assert!(!prompt.content.contains("{contexts}"));
    }

    #[tokio::test]
    async fn zero_history_budget_sends_no_history() {
        let mut settings = settings();
        settings.budgets.history = 0;
        let provider = Arc::new(hackathon_provider().reply("one").reply("two"));
        let bot = orchestrator(provider.clone(), settings);
        let id = ConversationId::from("chat");

        bot.answer(&id, "first question").await.unwrap();
        bot.answer(&id, "second question").await.unwrap();

        let request = provider.last_request();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].role, Role::User);

        let turns = bot.cache().turns(&id).lock().unwrap().clone();
        assert_eq!(turns, vec![Turn::user("second question"), Turn::assistant("two")]);
    }

    #[tokio::test]
    async fn completion_failure_leaves_cache_untouched() {
        let provider = Arc::new(
            hackathon_provider()
                .reply("fine")
                .fail(ProviderError::Network("connection reset".into())),
        );
        let bot = orchestrator(provider.clone(), settings());
        let id = ConversationId::from("chat");

        bot.answer(&id, "first").await.unwrap();
        let turns_before = bot.cache().turns(&id).lock().unwrap().clone();
        let contexts_before = bot.cache().contexts(&id).lock().unwrap().clone();

        let err = bot.answer(&id, "second").await.unwrap_err();
        assert!(matches!(err, Error::Answer(AnswerError::Generation(_))));
        assert_eq!(err.to_string(), ANSWER_FAILED_MESSAGE);
        assert_eq!(err.user_message(), ANSWER_FAILED_MESSAGE);

        assert_eq!(*bot.cache().turns(&id).lock().unwrap(), turns_before);
        assert_eq!(*bot.cache().contexts(&id).lock().unwrap(), contexts_before);
    }

    #[tokio::test]
    async fn embedding_failure_skips_completion() {
        let provider = Arc::new(hackathon_provider().failing_embeddings());
        let bot = orchestrator(provider.clone(), settings());

        let err = bot.answer(&ConversationId::from("chat"), "q").await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(RetrievalError::EmbeddingService(_))));
        assert_eq!(provider.complete_calls(), 0);
    }

    #[tokio::test]
    async fn stored_contexts_accumulate_within_budget() {
        let provider = Arc::new(hackathon_provider().reply("a").reply("b"));
        let bot = orchestrator(provider, settings());
        let id = ConversationId::from("chat");

        bot.answer(&id, "q1").await.unwrap();
        bot.answer(&id, "q2").await.unwrap();
        assert_eq!(bot.cache().contexts(&id).lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn stored_contexts_give_way_to_current_ones() {
        let mut settings = settings();
        settings.budgets.context = 0;
        let provider = Arc::new(hackathon_provider().reply("a").reply("b"));
        let bot = orchestrator(provider, settings);
        let id = ConversationId::from("chat");

        bot.answer(&id, "q1").await.unwrap();
        bot.answer(&id, "q2").await.unwrap();
        // Old contexts trimmed to nothing; only the current pair remains.
        assert_eq!(bot.cache().contexts(&id).lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn conversations_do_not_share_history() {
        let provider = Arc::new(hackathon_provider().reply("for a").reply("for b"));
        let bot = orchestrator(provider.clone(), settings());

        bot.answer(&ConversationId::from("a"), "question a").await.unwrap();
        bot.answer(&ConversationId::from("b"), "question b").await.unwrap();

        assert_eq!(provider.last_request().messages.len(), 2);
    }

    #[tokio::test]
    async fn works_through_assistant_trait() {
        let provider = Arc::new(hackathon_provider().reply("hi"));
        let bot: Arc<dyn Assistant> = Arc::new(orchestrator(provider, settings()));
        assert_eq!(bot.ask(&ConversationId::from("x"), "hello").await.unwrap(), "hi");
    }

    #[test]
    fn unknown_model_fails_construction() {
        let mut settings = settings();
        settings.model = "no-such-model".into();
        let cache = Arc::new(ConversationCache::new(1, Duration::from_secs(1)));
        let result = AnswerOrchestrator::new(
            Arc::new(hackathon_provider()),
            Arc::new(hackathon_corpus()),
            cache,
            settings,
        );
        assert!(matches!(result, Err(TokenizerError::UnsupportedModel(_))));
    }

    #[test]
    fn render_fills_both_placeholders_once() {
        let rendered = render_prompt("C: {contexts}\nQ: {query}", "ctx {query}", "what {contexts}?");
        assert_eq!(rendered, "C: ctx {query}\nQ: what {contexts}?");
    }

    #[test]
    fn render_keeps_other_braces() {
        assert_eq!(render_prompt("{x} {query} }", "", "q"), "{x} q }");
    }
}
