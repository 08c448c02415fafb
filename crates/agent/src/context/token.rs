//! Model-specific token counting.
//!
//! Counts come from the BPE encoding tiktoken associates with the model
//! name, so they match what the completion endpoint bills. A model with no
//! known encoding is an error; there is no fallback encoding.

use std::fmt;
use std::sync::Arc;

use helperbot_core::error::TokenizerError;
use helperbot_core::message::{ContextPassage, Turn};
use tiktoken_rs::CoreBPE;

/// Token counter bound to one model's encoding. Cheap to clone.
#[derive(Clone)]
pub struct TokenCounter {
    model: String,
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// Create a counter for `model`, failing if tiktoken has no encoding for it.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| TokenizerError::UnsupportedModel(model.to_string()))?;
        Ok(Self {
            model: model.to_string(),
            bpe: Arc::new(bpe),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of tokens `text` encodes to.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cost of a conversation turn: its content plus its role label.
    pub fn turn_cost(&self, turn: &Turn) -> usize {
        self.count(&turn.content) + self.count(turn.role.as_str())
    }

    /// Cost of a context passage in its labeled prompt form.
    pub fn passage_cost(&self, passage: &ContextPassage) -> usize {
        self.count(&passage.labeled)
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter").field("model", &self.model).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn known_model_counts_tokens() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert_eq!(counter.count("hello"), 1);
        assert_eq!(counter.count("hello world"), 2);
        assert!(counter.count(&"lorem ipsum ".repeat(50)) > 50);
    }

    #[test]
    fn counting_is_deterministic() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let text = "When does the A2SV hackathon start?";
        assert_eq!(counter.count(text), counter.count(text));
        let other = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert_eq!(counter.count(text), other.count(text));
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = TokenCounter::for_model("definitely-not-a-model").unwrap_err();
        assert_eq!(
            err,
            TokenizerError::UnsupportedModel("definitely-not-a-model".into())
        );
    }

    #[test]
    fn turn_cost_includes_role() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let turn = Turn::user("hello");
        assert_eq!(counter.turn_cost(&turn), counter.count("hello") + counter.count("user"));
    }

    #[test]
    fn passage_cost_uses_labeled_form() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        let passage = ContextPassage::new("Hackathon starts in May", "A2SV section");
        assert_eq!(counter.passage_cost(&passage), counter.count(&passage.labeled));
        assert!(counter.passage_cost(&passage) > counter.count(&passage.text));
    }

    #[test]
    fn debug_shows_model_only() {
        let counter = TokenCounter::for_model("gpt-4").unwrap();
        assert_eq!(format!("{counter:?}"), "TokenCounter { model: \"gpt-4\" }");
    }
}
